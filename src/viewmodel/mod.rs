//! Client-side read models driven by the UI shell.

pub mod chat_list;
pub mod message_thread;
pub mod scope;
pub mod toast;

pub use chat_list::{filter_by_name, sort_conversations, ChatListViewModel, DeleteDialog};
pub use message_thread::MessageThreadView;
pub use scope::{mount, MountHandle, ViewScope};
pub use toast::{Toast, ToastKind};
