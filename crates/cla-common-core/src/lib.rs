// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod constants;
pub mod context;

pub use constants::*;
pub use context::{ContextError, RequestContext};
