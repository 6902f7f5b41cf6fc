use std::error::Error;

use clap::{Args, Subcommand};
use fans_store::{GroupMember, Session};

#[derive(Args, Debug)]
pub struct GroupArgs {
    #[command(subcommand)]
    pub command: GroupCommand,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Get or create a group.
    Create { name: String },
    /// Add existing nodes and jobs to a group, creating it if needed.
    Add {
        name: String,
        #[arg(long = "node")]
        nodes: Vec<i64>,
        #[arg(long = "job")]
        jobs: Vec<i64>,
    },
    /// List the members of a group.
    List { name: String },
}

pub fn run(session: &mut Session, args: &GroupArgs) -> Result<(), Box<dyn Error>> {
    match &args.command {
        GroupCommand::Create { name } => {
            let resolution = session.resolve_group(name)?;
            let verb = if resolution.was_created() { "created" } else { "reused" };
            println!("{verb} group {} ({})", name, resolution.record().id);
        }
        GroupCommand::Add { name, nodes, jobs } => {
            let mut members = Vec::with_capacity(nodes.len() + jobs.len());
            for &id in nodes {
                session.load_node(id)?;
                members.push(GroupMember::Node(id));
            }
            for &id in jobs {
                session.load_job(id)?;
                members.push(GroupMember::Job(id));
            }
            let group = session.resolve_group(name)?.into_record();
            session.add_to_group(group.id, &members)?;
            println!("added {} members to {}", members.len(), group.name);
        }
        GroupCommand::List { name } => {
            let group = session.load_group(name)?;
            for member in session.group_members(group.id)? {
                match member {
                    GroupMember::Node(id) => {
                        let node = session.load_node(id)?;
                        println!("node\t{}\t{}\t{}", id, node.label, node.payload.kind_tag());
                    }
                    GroupMember::Job(id) => {
                        let job = session.load_job(id)?;
                        println!("job\t{}\t{}\t{}", id, job.label, job.status);
                    }
                }
            }
        }
    }
    Ok(())
}
