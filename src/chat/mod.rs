// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Chat model: sessions, requests and the response channel agents write into.

mod request;
mod response;
mod session;

pub use request::{cancelled, ChatRequest, RequestContext};
pub use response::{
    ChatResponse, ProgressMessage, ProgressStatus, ResponseContent, ResponseEvent, ResponseState,
};
pub use session::{ChatSession, SessionId};
