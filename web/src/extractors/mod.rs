pub(crate) mod current_subject;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
