//! Storage key constants.

/// Origin-scoped keys holding the persisted session.
pub struct StorageKeys;

impl StorageKeys {
    /// Access token
    pub const ACCESS_TOKEN: &'static str = "token";

    /// Refresh token
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Access token expiry (RFC 3339 timestamp)
    pub const ACCESS_TOKEN_EXPIRY: &'static str = "tokenExpiry";

    /// Every key the session owns, in write order.
    pub const ALL: [&'static str; 3] = [
        Self::ACCESS_TOKEN,
        Self::REFRESH_TOKEN,
        Self::ACCESS_TOKEN_EXPIRY,
    ];
}
