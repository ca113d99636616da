//! Request extractors whose rejections leave the server as `AppError`
//!
//! Axum's stock `Json`, `Query` and `Path` answer malformed input with plain
//! text and, for bodies, 422. These wrappers run the same extraction and turn
//! the rejection into a validation error with the usual JSON body.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query string
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);
