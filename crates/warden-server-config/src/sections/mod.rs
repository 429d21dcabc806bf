// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod http;
mod logging;
mod management;
mod opa;

pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use management::{ManagementConfig, ManagementConfigLayer, ManagementMode};
pub use opa::{OpaConfig, OpaConfigLayer};
