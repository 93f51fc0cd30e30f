//! Phone number to SIP address canonicalization.
//!
//! Pure functions, no I/O: raw dial strings like "(555) 123-4567" become
//! `sip:5551234567@<domain>`, where the domain is derived from the
//! configured registrar endpoint.

const SIP_SCHEME: &str = "sip:";

/// Extract the host component of a registrar endpoint.
///
/// Strips a `sip:` scheme prefix, takes the part after a final `@` if one
/// is present, and discards any `:port` suffix.
pub fn registrar_domain(registrar: &str) -> String {
    let without_scheme = registrar.strip_prefix(SIP_SCHEME).unwrap_or(registrar);
    let host = without_scheme
        .rsplit_once('@')
        .map(|(_, host)| host)
        .unwrap_or(without_scheme);
    host.split(':').next().unwrap_or(host).to_string()
}

/// Canonicalize a dial string into a SIP address.
///
/// An input that already carries the `sip:` scheme is passed through
/// unchanged, which makes the function idempotent. Anything else is reduced
/// to its digits (plus a single leading `+`) and addressed at `domain`.
pub fn normalize(raw: &str, domain: &str) -> String {
    if raw.starts_with(SIP_SCHEME) {
        return raw.to_string();
    }

    let mut cleaned = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            cleaned.push(c);
        }
    }

    format!("{SIP_SCHEME}{cleaned}@{domain}")
}
