//! Strict path-segment join of a target base path and a request path.
//!
//! Empty and `.` segments are dropped. `..` only pops segments contributed by
//! the request, so the result always stays under the base path. Percent-encoded
//! dots count as dots, since URL serialization would decode them.

/// Join `base` and `request` as path segments.
pub fn join_paths(base: &str, request: &str) -> String {
    let mut segments: Vec<&str> = base
        .split('/')
        .filter(|s| !s.is_empty() && !is_dot(s) && !is_dot_dot(s))
        .collect();
    let floor = segments.len();

    for segment in request.split('/') {
        if segment.is_empty() || is_dot(segment) {
            continue;
        }
        if is_dot_dot(segment) {
            if segments.len() > floor {
                segments.pop();
            }
            continue;
        }
        segments.push(segment);
    }

    let mut joined = String::with_capacity(base.len() + request.len() + 1);
    joined.push('/');
    joined.push_str(&segments.join("/"));
    if segments.len() > floor && request.ends_with('/') {
        joined.push('/');
    }
    joined
}

fn is_dot(segment: &str) -> bool {
    segment == "." || segment.eq_ignore_ascii_case("%2e")
}

fn is_dot_dot(segment: &str) -> bool {
    matches!(
        segment.to_ascii_lowercase().as_str(),
        ".." | ".%2e" | "%2e." | "%2e%2e"
    )
}
