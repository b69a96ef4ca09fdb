//! Built-in csbot plugins.
//!
//! Linking this crate registers every plugin below with the bot's plugin
//! catalog; the `plugins` option decides which of them are loaded.
//!
//! | Plugin | Commands |
//! |--------|----------|
//! | [`example`](Example) | `test`, `cfg` |
//! | [`auth`](Auth) | `auth.check` |
//! | [`plugins`](Admin) | `plugins.list`, `plugins.load`, `plugins.unload`, `plugins.reload` |

mod admin;
mod auth;
mod example;

use csbot_core::register_plugin;

pub use admin::Admin;
pub use auth::Auth;
pub use example::Example;

register_plugin!(EXAMPLE: Example);
register_plugin!(AUTH: Auth);
register_plugin!(ADMIN: Admin);
