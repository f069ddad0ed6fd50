/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth (bearer gate), http (request id / trace / limit / timeout), cors, security headers
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
