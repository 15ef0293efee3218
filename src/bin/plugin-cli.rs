use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use plugin_host::group::{
    CommitGroupRequest, DescribeGroupRequest, DestroyGroupRequest, FreeGroupRequest, GroupId,
    GroupSpec, InspectGroupsRequest,
};
use plugin_sdk::PluginClient;

#[derive(Parser)]
#[command(name = "plugin-cli")]
#[command(about = "Call a group plugin over its Unix socket", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "/run/plugin-host/group.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Commit a group spec read from a JSON file
    Commit {
        spec: PathBuf,
        /// Report what would change without changing it
        #[arg(long)]
        pretend: bool,
    },
    /// Stop managing a group
    Free { id: String },
    /// Describe a group's instances
    Describe { id: String },
    /// Destroy a group
    Destroy { id: String },
    /// List committed group specs
    Inspect,
    /// Call any method with raw JSON params
    Call {
        method: String,
        #[arg(default_value = "{}")]
        params: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut client = PluginClient::connect(&cli.socket).await?;

    let result: Value = match cli.command {
        Commands::Commit { spec, pretend } => {
            let spec: GroupSpec = serde_json::from_str(&std::fs::read_to_string(spec)?)?;
            client
                .call("Group.CommitGroup", &CommitGroupRequest { spec, pretend })
                .await?
        }
        Commands::Free { id } => {
            client
                .call("Group.FreeGroup", &FreeGroupRequest { id: GroupId(id) })
                .await?
        }
        Commands::Describe { id } => {
            client
                .call("Group.DescribeGroup", &DescribeGroupRequest { id: GroupId(id) })
                .await?
        }
        Commands::Destroy { id } => {
            client
                .call("Group.DestroyGroup", &DestroyGroupRequest { id: GroupId(id) })
                .await?
        }
        Commands::Inspect => {
            client
                .call("Group.InspectGroups", &InspectGroupsRequest::default())
                .await?
        }
        Commands::Call { method, params } => {
            let params: Value = serde_json::from_str(&params)?;
            client.call(&method, &params).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
