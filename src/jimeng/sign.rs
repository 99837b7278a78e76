/// Request signature expected by the Jimeng web API.
///
/// MD5 over `9e2c|{last 7 chars of path}|{platform}|{version}|{device_time}||11ac`,
/// hex encoded in lowercase.
pub fn sign(path: &str, platform_code: &str, version_code: &str, device_time: i64) -> String {
    let suffix = tail(path, 7);
    let raw = format!("9e2c|{suffix}|{platform_code}|{version_code}|{device_time}||11ac");
    format!("{:x}", md5::compute(raw))
}

/// Last `n` characters of `s`, or all of it when shorter.
fn tail(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
