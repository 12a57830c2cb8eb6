pub mod cli {
    pub mod commands;
    pub mod handlers;
    pub mod output;
}
pub mod grid;
pub mod io {
    pub mod config_io;
    pub mod state;
    pub mod tree_store;
    pub mod watcher;
}
pub mod logging;
pub mod model;
pub mod ops {
    pub mod drafts;
    pub mod projection;
    pub mod records;
    pub mod tree_codec;
    pub mod validator;
}
pub mod tui;
