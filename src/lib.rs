// Configuration (TOML file + environment)
pub mod config;

// Cipher envelope and token store
pub mod credentials;

// Save / update-bio / delete orchestration
pub mod lifecycle;

// Upstream relay (live and mock)
pub mod relay;

// HTTP API
pub mod api;

// Per-client rate limiting
pub mod rate_limit;
