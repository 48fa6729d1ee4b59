// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions shared by the adapters.

/// Characters that cannot appear in a file name on at least one platform,
/// paired with their replacement.
const BAD_FILENAME_CHARS: [(char, &str); 9] = [
    ('\\', "+"),
    ('/', "+"),
    ('<', ""),
    ('>', ""),
    ('?', "!"),
    ('*', "-"),
    (':', "-"),
    ('|', ""),
    ('"', ""),
];

/// Strip or replace characters that are illegal in file names.
///
/// Used for backend-native titles before they are displayed or written to disk.
///
/// # Examples
///
/// ```
/// use fetchbridge::utils::clean_file_name;
///
/// assert_eq!(clean_file_name("Show: Part 1/2?"), "Show- Part 1+2!");
/// ```
pub fn clean_file_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());

    for c in name.chars() {
        match BAD_FILENAME_CHARS.iter().find(|(bad, _)| *bad == c) {
            Some((_, good)) => result.push_str(good),
            None => result.push(c),
        }
    }

    result.trim().to_string()
}

/// Mask a sensitive string (like a download client password) for logging.
///
/// Shows only the first `visible_prefix` characters and replaces the rest with "...".
///
/// # Examples
///
/// ```
/// use fetchbridge::utils::mask_sensitive;
///
/// assert_eq!(mask_sensitive("tegbzn6789", 3), "teg...");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    if input.chars().count() <= visible_prefix {
        // Short values would be shown in full
        return "***".to_string();
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}...", prefix)
}
