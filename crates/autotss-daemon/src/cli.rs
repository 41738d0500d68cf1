use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "autotss",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("AUTOTSS_GIT_SHA"), ")"),
    about = "Automatically save SHSH blobs for registered devices"
)]
pub struct Cli {
    /// Config file (defaults to $AUTOTSS_CONFIG, then ~/.autotss/autotss.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save blobs on the configured interval until interrupted
    Run,
    /// One pass over every enabled user
    SaveAll,
    /// Save blobs for one user now, even if they are disabled
    Save {
        #[arg(long)]
        user: u64,
    },
    /// Manage a user's devices
    #[command(subcommand)]
    Devices(DevicesCommand),
    /// Enable or disable scheduled saving for a user
    #[command(subcommand)]
    Users(UsersCommand),
    /// Saved blob and enabled device counts
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum DevicesCommand {
    List {
        #[arg(long)]
        user: u64,
    },
    Add(AddDevice),
    /// Remove a device and every blob saved for it
    Remove {
        #[arg(long)]
        user: u64,
        #[arg(long)]
        name: String,
    },
}

#[derive(Args, Debug)]
pub struct AddDevice {
    #[arg(long)]
    pub user: u64,
    #[arg(long)]
    pub name: String,
    /// Product identifier, e.g. iPhone10,1
    #[arg(long)]
    pub identifier: String,
    /// Board config; may be omitted when the identifier has a single board
    #[arg(long)]
    pub board: Option<String>,
    #[arg(long)]
    pub ecid: String,
    #[arg(long)]
    pub generator: Option<String>,
    #[arg(long)]
    pub apnonce: Option<String>,
    /// Bypass the per-user device limit
    #[arg(long, default_value_t = false)]
    pub owner: bool,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    Enable {
        #[arg(long)]
        user: u64,
    },
    Disable {
        #[arg(long)]
        user: u64,
    },
}
