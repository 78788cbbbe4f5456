use md5::{Digest, Md5};

/// Hash the device password the way OpenSprinkler expects it
///
/// Every API call carries `pw=<md5 hex of the plain password>`.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build an authenticated query string
///
/// Example:
/// ```
/// use sprinkler_leak::controller::opensprinkler::auth::build_query;
///
/// let query = build_query(&[("hist", "30")], "a6d82bced638de3def1e9bbb4983225c");
/// assert_eq!(query, "pw=a6d82bced638de3def1e9bbb4983225c&hist=30");
/// ```
pub fn build_query(params: &[(&str, &str)], password_hash: &str) -> String {
    let mut query_params = vec![format!("pw={}", password_hash)];
    query_params.extend(params.iter().map(|(k, v)| format!("{}={}", k, v)));
    query_params.join("&")
}
