//! grove CLI - git-style object store command line interface

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use grove::ops::{self, BranchFilter, BranchKind, CommitRequest, RevWalk, WalkOrder};
use grove::transport::{fetch, transport_for};
use grove::{CancelToken, HeadState, Object, ObjectKind, Repository, HEAD};

#[derive(Parser)]
#[command(name = "grove")]
#[command(about = "git-style content-addressed object store")]
#[command(version)]
struct Cli {
    /// repository path
    #[arg(short, long, default_value = ".", env = "GROVE_DIR")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// initialize a new repository
    Init {
        /// path to create repository at
        #[arg(default_value = ".")]
        path: PathBuf,

        /// create a bare repository
        #[arg(long)]
        bare: bool,
    },

    /// find the repository containing a path
    Discover {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// snapshot a directory and commit it
    Commit {
        /// directory to snapshot (defaults to the working directory)
        source: Option<PathBuf>,

        /// commit message
        #[arg(short, long)]
        message: String,

        /// ref to advance
        #[arg(long = "ref", default_value = HEAD)]
        update_ref: String,
    },

    /// show commit log
    Log {
        /// revision to start from
        #[arg(default_value = HEAD)]
        rev: String,

        /// maximum number of commits to show
        #[arg(short = 'n', long)]
        max_count: Option<usize>,
    },

    /// list commit ids reachable from revisions
    RevList {
        #[arg(required = true)]
        revs: Vec<String>,

        /// exclude commits reachable from these revisions
        #[arg(long)]
        not: Vec<String>,

        #[arg(long, value_enum, default_value = "time")]
        order: Order,
    },

    /// resolve a revision to an object id
    RevParse {
        rev: String,

        /// output short id
        #[arg(long)]
        short: bool,
    },

    /// show contents of an object
    CatFile {
        /// print the object kind instead of its contents
        #[arg(short = 't')]
        kind_only: bool,

        /// object id or revision
        object: String,
    },

    /// list tree contents
    LsTree {
        /// tree, commit or revision
        rev: String,
    },

    /// list refs
    Refs {
        /// glob pattern such as `refs/heads/*`
        pattern: Option<String>,
    },

    /// show where HEAD points
    Head,

    /// summarize repository state
    Status,

    /// list, create or delete branches
    Branch {
        #[command(subcommand)]
        action: Option<BranchAction>,
    },

    /// list or create tags
    Tag {
        #[command(subcommand)]
        action: Option<TagAction>,
    },

    /// manage notes
    Notes {
        /// notes ref (defaults to the configured namespace)
        #[arg(long = "ref", global = true)]
        notes_ref: Option<String>,

        #[command(subcommand)]
        action: Option<NotesAction>,
    },

    /// check whether a commit descends from another
    DescendantOf { commit: String, ancestor: String },

    /// nearest common ancestor of two commits
    MergeBase { a: String, b: String },

    /// verify repository integrity
    Fsck,

    /// manage remotes
    Remote {
        #[command(subcommand)]
        action: Option<RemoteAction>,
    },

    /// fetch branches and tags from a remote
    Fetch {
        remote: String,

        /// give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// set the identity used for commits, tags and notes
    Identity { name: String, email: String },
}

#[derive(Subcommand)]
enum BranchAction {
    /// list branches
    List {
        #[arg(long)]
        remote: bool,
        #[arg(short, long)]
        all: bool,
    },
    /// create a branch
    Create {
        name: String,
        #[arg(default_value = HEAD)]
        target: String,
        #[arg(short, long)]
        force: bool,
    },
    /// delete a branch
    Delete { name: String },
}

#[derive(Subcommand)]
enum TagAction {
    /// list tags
    List,
    /// create a tag; annotated when a message is given
    Create {
        name: String,
        #[arg(default_value = HEAD)]
        target: String,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(short, long)]
        force: bool,
    },
    /// delete a tag
    Delete { name: String },
}

#[derive(Subcommand)]
enum NotesAction {
    /// list notes
    List,
    /// attach a note
    Add {
        #[arg(default_value = HEAD)]
        target: String,
        #[arg(short, long)]
        message: String,
        #[arg(short, long)]
        force: bool,
    },
    /// show a note
    Show {
        #[arg(default_value = HEAD)]
        target: String,
    },
    /// remove a note
    Remove {
        #[arg(default_value = HEAD)]
        target: String,
    },
}

#[derive(Subcommand)]
enum RemoteAction {
    List,
    Add { name: String, url: String },
    Remove { name: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Order {
    Time,
    Topo,
    Insertion,
}

impl From<Order> for WalkOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Time => WalkOrder::Time,
            Order::Topo => WalkOrder::Topological,
            Order::Insertion => WalkOrder::Insertion,
        }
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_env("GROVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> grove::Result<ExitCode> {
    match cli.command {
        Commands::Init { path, bare } => {
            Repository::init(&path, bare)?;
            println!("initialized grove repository at {}", path.display());
        }

        Commands::Discover { path } => match Repository::discover(&path) {
            Some(root) => println!("{}", root.display()),
            None => return Err(grove::Error::RepositoryNotFound(path)),
        },

        Commands::Commit {
            source,
            message,
            update_ref,
        } => {
            let repo = Repository::open(&cli.repo)?;
            let source = match source.or_else(|| repo.workdir().map(PathBuf::from)) {
                Some(source) => source,
                None => {
                    return Err(grove::Error::InvalidConfig(
                        "bare repository: give a directory to commit".to_string(),
                    ))
                }
            };

            let signature = repo.default_signature()?;
            let (_, parent) = repo.refs().follow(&update_ref)?;
            let tree = ops::snapshot_dir(&repo, &source)?;
            let id = ops::commit(
                &repo,
                CommitRequest {
                    update_ref: Some(update_ref),
                    author: signature.clone(),
                    committer: signature,
                    message: ensure_newline(message),
                    tree,
                    parents: parent.into_iter().collect(),
                },
            )?;
            println!("{}", id);
        }

        Commands::Log { rev, max_count } => {
            let repo = Repository::open(&cli.repo)?;
            for entry in ops::log(&repo, &rev, max_count)? {
                println!("{}", entry);
            }
        }

        Commands::RevList { revs, not, order } => {
            let repo = Repository::open(&cli.repo)?;
            let mut walk = RevWalk::new(&repo);
            walk.sorting(order.into());
            for rev in &revs {
                walk.push(repo.refs().resolve_rev(rev)?)?;
            }
            for rev in &not {
                walk.hide(repo.refs().resolve_rev(rev)?)?;
            }
            for id in walk {
                println!("{}", id?);
            }
        }

        Commands::RevParse { rev, short } => {
            let repo = Repository::open(&cli.repo)?;
            let id = repo.refs().resolve_rev(&rev)?;
            if short {
                println!("{}", id.short());
            } else {
                println!("{}", id);
            }
        }

        Commands::CatFile { kind_only, object } => {
            let repo = Repository::open(&cli.repo)?;
            let id = repo.refs().resolve_rev(&object)?;

            if kind_only {
                println!("{}", repo.objects().read_kind(&id)?);
                return Ok(ExitCode::SUCCESS);
            }

            match repo.objects().read(&id)? {
                Object::Blob(data) => {
                    io::stdout().write_all(&data).map_err(|e| grove::Error::Io {
                        path: "stdout".into(),
                        source: e,
                    })?;
                }
                Object::Tree(tree) => print_tree(&tree),
                Object::Commit(commit) => {
                    println!("tree {}", commit.tree);
                    for parent in &commit.parents {
                        println!("parent {}", parent);
                    }
                    println!("author {}", commit.author);
                    println!("committer {}", commit.committer);
                    println!();
                    print!("{}", commit.message);
                }
                Object::Tag(tag) => {
                    println!("object {}", tag.target);
                    println!("type {}", tag.target_kind);
                    println!("tag {}", tag.name);
                    println!("tagger {}", tag.tagger);
                    println!();
                    print!("{}", tag.message);
                }
            }
        }

        Commands::LsTree { rev } => {
            let repo = Repository::open(&cli.repo)?;
            let id = repo.refs().resolve_rev(&rev)?;
            let (peeled, object) = repo.objects().peel(&id)?;
            let tree = match object {
                Object::Commit(commit) => repo.objects().read_tree(&commit.tree)?,
                Object::Tree(tree) => tree,
                other => {
                    return Err(grove::Error::InvalidObjectType {
                        id: peeled,
                        expected: ObjectKind::Tree.as_str(),
                        actual: other.kind().as_str(),
                    })
                }
            };
            print_tree(&tree);
        }

        Commands::Refs { pattern } => {
            let repo = Repository::open(&cli.repo)?;
            let refs = match pattern {
                Some(pattern) => repo.refs().list_matching(&pattern)?,
                None => repo.refs().list(None)?,
            };
            for reference in refs {
                match reference.target() {
                    Some(id) => println!("{} {}", id, reference.name()),
                    None => println!("{}", reference),
                }
            }
        }

        Commands::Head => {
            let repo = Repository::open(&cli.repo)?;
            println!("{}", describe_head(&repo.head()?));
        }

        Commands::Status => {
            let repo = Repository::open(&cli.repo)?;
            let summary = repo.summary()?;
            println!("{}", describe_head(&summary.head));
            if repo.is_bare() {
                println!("bare repository");
            }
            if repo.is_shallow() {
                println!("shallow repository");
            }
            println!(
                "{} local branches, {} remote branches, {} tags, {} notes",
                summary.local_branches, summary.remote_branches, summary.tags, summary.notes
            );
            println!("{} commits reachable from HEAD", summary.commits);
        }

        Commands::Branch { action } => {
            let repo = Repository::open(&cli.repo)?;
            match action.unwrap_or(BranchAction::List {
                remote: false,
                all: false,
            }) {
                BranchAction::List { remote, all } => {
                    let filter = match (all, remote) {
                        (true, _) => BranchFilter::All,
                        (false, true) => BranchFilter::Remote,
                        (false, false) => BranchFilter::Local,
                    };
                    for branch in ops::branches(&repo, filter)? {
                        let marker = if branch.is_head { '*' } else { ' ' };
                        let name = match branch.kind {
                            BranchKind::Local => branch.name.clone(),
                            BranchKind::Remote => format!("remotes/{}", branch.name),
                        };
                        println!("{} {} {}", marker, name, branch.target.short());
                    }
                }
                BranchAction::Create {
                    name,
                    target,
                    force,
                } => {
                    let target = repo.refs().resolve_rev(&target)?;
                    let branch = ops::create_branch(&repo, &name, target, force)?;
                    println!("created branch {} at {}", branch.name, branch.target.short());
                }
                BranchAction::Delete { name } => {
                    ops::delete_branch(&repo, &name)?;
                    println!("deleted branch {}", name);
                }
            }
        }

        Commands::Tag { action } => {
            let repo = Repository::open(&cli.repo)?;
            match action.unwrap_or(TagAction::List) {
                TagAction::List => {
                    for tag in ops::tags(&repo)? {
                        println!("{} {}", tag.peeled().short(), tag.name);
                    }
                }
                TagAction::Create {
                    name,
                    target,
                    message,
                    force,
                } => {
                    let target = repo.refs().resolve_rev(&target)?;
                    match message {
                        Some(message) => {
                            let tagger = repo.default_signature()?;
                            let id = ops::create_tag(
                                &repo,
                                &name,
                                target,
                                tagger,
                                &ensure_newline(message),
                                force,
                            )?;
                            println!("{}", id);
                        }
                        None => {
                            ops::create_lightweight_tag(&repo, &name, target, force)?;
                            println!("{}", target);
                        }
                    }
                }
                TagAction::Delete { name } => {
                    ops::delete_tag(&repo, &name)?;
                    println!("deleted tag {}", name);
                }
            }
        }

        Commands::Notes { notes_ref, action } => {
            let repo = Repository::open(&cli.repo)?;
            let notes_ref = notes_ref.as_deref();
            match action.unwrap_or(NotesAction::List) {
                NotesAction::List => {
                    for note in ops::notes::list(&repo, notes_ref)? {
                        println!("{} {}", note.id, note.target);
                    }
                }
                NotesAction::Add {
                    target,
                    message,
                    force,
                } => {
                    let target = repo.refs().resolve_rev(&target)?;
                    let sig = repo.default_signature()?;
                    let note = ops::notes::create(
                        &repo,
                        target,
                        &ensure_newline(message),
                        &sig,
                        &sig,
                        notes_ref,
                        force,
                    )?;
                    println!("{}", note.id);
                }
                NotesAction::Show { target } => {
                    let target = repo.refs().resolve_rev(&target)?;
                    print!("{}", ops::notes::read(&repo, target, notes_ref)?.message);
                }
                NotesAction::Remove { target } => {
                    let target = repo.refs().resolve_rev(&target)?;
                    let sig = repo.default_signature()?;
                    ops::notes::remove(&repo, target, notes_ref, &sig, &sig)?;
                    println!("removed note for {}", target.short());
                }
            }
        }

        Commands::DescendantOf { commit, ancestor } => {
            let repo = Repository::open(&cli.repo)?;
            let commit = repo.refs().resolve_rev(&commit)?;
            let ancestor = repo.refs().resolve_rev(&ancestor)?;
            println!("{}", ops::is_descendant_of(&repo, commit, ancestor)?);
        }

        Commands::MergeBase { a, b } => {
            let repo = Repository::open(&cli.repo)?;
            let a = repo.refs().resolve_rev(&a)?;
            let b = repo.refs().resolve_rev(&b)?;
            match ops::merge_base(&repo, a, b)? {
                Some(base) => println!("{}", base),
                None => println!("no common ancestor"),
            }
        }

        Commands::Fsck => {
            let repo = Repository::open(&cli.repo)?;
            let report = ops::fsck(&repo)?;

            println!("objects checked: {}", report.objects_checked);

            if !report.corrupt_objects.is_empty() {
                println!("\ncorrupt objects:");
                for obj in &report.corrupt_objects {
                    println!("  {}: {}", obj.id, obj.message);
                }
            }

            if !report.missing_objects.is_empty() {
                println!("\nmissing objects:");
                for obj in &report.missing_objects {
                    let kind = obj.expected.map_or("object", ObjectKind::as_str);
                    println!("  {} {} (referenced by {})", kind, obj.id, obj.referenced_by);
                }
            }

            if !report.dangling_objects.is_empty() {
                println!("\ndangling objects: {}", report.dangling_objects.len());
            }

            if report.is_ok() {
                println!("\nrepository is healthy");
            } else {
                println!("\nrepository has issues");
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Remote { action } => {
            let mut repo = Repository::open(&cli.repo)?;
            match action.unwrap_or(RemoteAction::List) {
                RemoteAction::List => {
                    for remote in &repo.config().remotes {
                        println!("{}\t{}", remote.name, remote.url);
                    }
                }
                RemoteAction::Add { name, url } => {
                    repo.config_mut().add_remote(name, url)?;
                    repo.save_config()?;
                }
                RemoteAction::Remove { name } => {
                    repo.config_mut().remove_remote(&name)?;
                    repo.save_config()?;
                }
            }
        }

        Commands::Fetch { remote, timeout } => {
            let repo = Repository::open(&cli.repo)?;
            let config = repo
                .config()
                .get_remote(&remote)
                .cloned()
                .ok_or_else(|| grove::Error::RemoteNotFound(remote.clone()))?;

            let cancel = match timeout {
                Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
                None => CancelToken::new(),
            };
            let mut transport = transport_for(&config)?;
            let result = fetch(&repo, &remote, transport.as_mut(), &cancel)?;

            for change in &result.updated {
                match change.old {
                    Some(old) => println!("{}..{} {}", old.short(), change.new.short(), change.name),
                    None => println!("* {} {}", change.new.short(), change.name),
                }
            }
            println!(
                "received {} objects ({} bytes), {} already present",
                result.stats.received, result.stats.bytes_transferred, result.stats.skipped
            );
        }

        Commands::Identity { name, email } => {
            let mut repo = Repository::open(&cli.repo)?;
            // reject identities that could not be written into a signature
            grove::Signature::new(name.as_str(), email.as_str(), 0, 0)?;
            repo.config_mut().user.name = Some(name);
            repo.config_mut().user.email = Some(email);
            repo.save_config()?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_tree(tree: &grove::Tree) {
    for entry in tree.entries() {
        println!(
            "{:0>6} {} {}\t{}",
            entry.mode.as_octal(),
            entry.mode.type_name(),
            entry.target,
            entry.name
        );
    }
}

fn describe_head(head: &HeadState) -> String {
    match head {
        HeadState::Unborn => "HEAD is unborn".to_string(),
        HeadState::Detached(id) => format!("HEAD detached at {}", id.short()),
        HeadState::OnBranch(branch) => {
            format!("on branch {} at {}", branch.name, branch.target.short())
        }
    }
}

fn ensure_newline(mut message: String) -> String {
    if !message.ends_with('\n') {
        message.push('\n');
    }
    message
}
