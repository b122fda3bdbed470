//! Shared test harness modules for the Greenway CLI.

use super::*;

mod helpers;
mod http_routes;
