//! cli
//!
//! Command dispatch: parses [`args::Cli`] and drives the [`crate::engine`]
//! and read-only [`crate::core`]/[`crate::git`] surfaces. Grounded in the
//! teacher's `cli::commands` module (one function per verb, a thin layer
//! over the engine that only formats output and resolves ambient state like
//! "current branch" or "default remote").

pub mod args;

use std::io;

use anyhow::{anyhow, bail, Context as _, Result};

use crate::core::graph::StackGraph;
use crate::core::metadata::{BranchEntry, FreezeScope, FreezeState, StacksFile};
use crate::core::types::BranchName;
use crate::engine::plan::{Intent, Plan, PlanStep};
use crate::engine::{Context, Engine, ExecuteResult};
use crate::forge::{create_forge, Forge};

use args::{BranchAction, Cli, Command, PrAction};

pub async fn run(cli: Cli) -> Result<()> {
    let cwd = match &cli.cwd {
        Some(p) => p.clone(),
        None => std::env::current_dir()?,
    };
    let mut ctx = Context::new(cwd);
    ctx.debug = cli.debug;
    ctx.quiet = cli.quiet;

    match cli.command {
        Command::Init => cmd_init(&ctx),
        Command::Branch { action } => cmd_branch(&ctx, action).await,
        Command::Up { n } => cmd_up_down(&ctx, n as i64),
        Command::Down { n } => cmd_up_down(&ctx, -(n as i64)),
        Command::Top => cmd_top_bottom(&ctx, true),
        Command::Bottom => cmd_top_bottom(&ctx, false),
        Command::Log { all, short } => cmd_log(&ctx, all, short),
        Command::Sync { all, from_main, r#continue, abort } => {
            cmd_sync(&ctx, all, from_main, r#continue, abort).await
        }
        Command::Restack => cmd_restack(&ctx).await,
        Command::Commit { message, amend, all } => cmd_commit(&ctx, message, amend, all).await,
        Command::Amend => cmd_commit(&ctx, None, true, true).await,
        Command::Move { to, from } => cmd_move(&ctx, to, from).await,
        Command::Submit { all, from, draft, no_edit } => cmd_submit(&ctx, all, from, draft, no_edit).await,
        Command::Pr { action } => cmd_pr(&ctx, action).await,
        Command::Land { squash, merge, rebase, all } => cmd_land(&ctx, squash, merge, rebase, all).await,
        Command::Stack => cmd_log(&ctx, true, false),
        Command::Graph => cmd_graph(&ctx),
        Command::Push { all, no_pr } => cmd_push(&ctx, all, no_pr).await,
        Command::Pull => cmd_pull(&ctx),
        Command::Fetch => cmd_fetch(&ctx),
        Command::Undo => cmd_undo(&ctx),
        Command::Redo => cmd_redo(&ctx),
        Command::Completions { shell } => cmd_completions(shell),
    }
}

fn cmd_init(ctx: &Context) -> Result<()> {
    let engine = Engine::open(ctx)?;
    if engine.store.exists() {
        println!("pancake is already initialized in this repository.");
        return Ok(());
    }
    let main_branch = BranchName::new(engine.config.repository.main_branch.clone())?;
    let head = engine
        .git
        .try_resolve_ref(&format!("refs/heads/{main_branch}"))?
        .ok_or_else(|| anyhow!("could not resolve {main_branch}; does it exist?"))?;
    let mut file = StacksFile::new(main_branch.clone());
    file.insert(BranchEntry::new(main_branch, None, head.clone(), head))
        .map_err(|e| anyhow!(e.to_string()))?;
    engine.store.save_and_mirror(&file, &engine.git)?;
    println!("Initialized pancake in {}", engine.pancake_dir().display());
    Ok(())
}

fn resolve_branch(engine: &Engine, query: Option<&str>) -> Result<BranchName> {
    if let Some(q) = query {
        let file = engine.store.load()?;
        let graph = load_graph(&file);
        let (_, matches) = graph.find(q);
        return match matches.as_slice() {
            [one] => Ok(one.clone()),
            [] => bail!("no tracked branch matches '{q}'"),
            many => bail!("'{q}' is ambiguous: {}", many.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", ")),
        };
    }
    engine
        .git
        .current_branch()?
        .ok_or_else(|| anyhow!("not currently on a branch (detached HEAD)"))
}

fn load_graph(file: &StacksFile) -> StackGraph {
    let mut graph = StackGraph::new(file.main_branch.clone());
    for entry in &file.branches {
        if let Some(parent) = &entry.parent {
            let _ = graph.add_edge(parent.clone(), entry.name.clone());
        }
    }
    graph
}

async fn cmd_branch(ctx: &Context, action: BranchAction) -> Result<()> {
    let engine = Engine::open(ctx)?;
    match action {
        BranchAction::Create { name, base, insert_before, insert_after, force: _ } => {
            let branch = BranchName::new(name)?;
            let at = engine.git.head_oid()?;
            let intent = if let Some(target) = insert_before.or(insert_after) {
                Intent::InsertBefore {
                    name: branch.clone(),
                    parent: BranchName::new(target)?,
                    at,
                }
            } else {
                let parent = match base {
                    Some(b) => BranchName::new(b)?,
                    None => resolve_branch(&engine, None)?,
                };
                Intent::CreateBranch { name: branch.clone(), parent, at }
            };
            engine.run("branch create", intent, None).await?;
            engine.git.checkout(&branch)?;
            println!("Created branch {branch}");
        }
        BranchAction::Rename { name, new_name } => {
            let from = BranchName::new(name)?;
            let to = BranchName::new(new_name)?;
            let plan = Plan::new("branch rename")
                .with_step(PlanStep::RenameRef { from: from.clone(), to: to.clone() })
                .with_step(PlanStep::CommitMetadata);
            engine.run_plan("branch rename", plan, None).await?;
            println!("Renamed {from} to {to}");
        }
        BranchAction::Delete { name, force: _ } => {
            let branch = BranchName::new(name)?;
            engine.run("branch delete", Intent::DeleteBranch { name: branch.clone() }, None).await?;
            println!("Deleted branch {branch}");
        }
        BranchAction::Checkout { query } => {
            let branch = resolve_branch(&engine, Some(&query))?;
            engine.git.checkout(&branch)?;
            println!("Switched to {branch}");
        }
        BranchAction::Freeze { name, downstack } => {
            let branch = resolve_branch(&engine, name.as_deref())?;
            let mut file = engine.store.load()?;
            let scope = if downstack { FreezeScope::DownstackInclusive } else { FreezeScope::Single };
            file.find_mut(&branch)
                .ok_or_else(|| anyhow!("{branch} is not tracked"))?
                .freeze = FreezeState::Frozen { scope };
            engine.store.save_and_mirror(&file, &engine.git)?;
            println!("Froze {branch}");
        }
        BranchAction::Thaw { name } => {
            let branch = resolve_branch(&engine, name.as_deref())?;
            let mut file = engine.store.load()?;
            file.find_mut(&branch)
                .ok_or_else(|| anyhow!("{branch} is not tracked"))?
                .freeze = FreezeState::Unfrozen;
            engine.store.save_and_mirror(&file, &engine.git)?;
            println!("Thawed {branch}");
        }
    }
    Ok(())
}

fn cmd_up_down(ctx: &Context, delta: i64) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let current = resolve_branch(&engine, None)?;
    let file = engine.store.load()?;
    let graph = load_graph(&file);

    let mut cursor = current.clone();
    if delta > 0 {
        for _ in 0..delta {
            match graph.children(&cursor).first() {
                Some(next) => cursor = next.clone(),
                None => break,
            }
        }
    } else {
        for _ in 0..(-delta) {
            match graph.parent(&cursor) {
                Some(next) => cursor = next.clone(),
                None => break,
            }
        }
    }
    if cursor == current {
        println!("Already at the edge of the stack on {current}");
    } else {
        engine.git.checkout(&cursor)?;
        println!("Switched to {cursor}");
    }
    Ok(())
}

fn cmd_top_bottom(ctx: &Context, top: bool) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let current = resolve_branch(&engine, None)?;
    let file = engine.store.load()?;
    let graph = load_graph(&file);
    let target = if top { graph.top_of(&current) } else { graph.bottom_of(&current) };
    engine.git.checkout(&target)?;
    println!("Switched to {target}");
    Ok(())
}

fn cmd_log(ctx: &Context, _all: bool, short: bool) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let file = engine.store.load()?;
    let graph = load_graph(&file);
    let current = engine.git.current_branch().ok().flatten();

    for branch in graph.topological_order() {
        let depth = graph.depth(&branch);
        let marker = if Some(&branch) == current.as_ref() { "* " } else { "  " };
        let indent = "  ".repeat(depth);
        if short {
            println!("{marker}{indent}{branch}");
            continue;
        }
        let entry = file.find(&branch);
        let pr = entry
            .and_then(|e| e.pr.as_ref())
            .map(|pr| format!(" (#{}, {:?})", pr.id, pr.status))
            .unwrap_or_default();
        let frozen = entry.map(|e| e.is_frozen()).unwrap_or(false);
        let frozen_tag = if frozen { " [frozen]" } else { "" };
        println!("{marker}{indent}{branch}{pr}{frozen_tag}");
    }
    Ok(())
}

fn cmd_graph(ctx: &Context) -> Result<()> {
    cmd_log(ctx, true, false)
}

async fn cmd_restack(ctx: &Context) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let current = resolve_branch(&engine, None)?;
    run_and_report(&engine, "restack", Intent::Restack { from: current }, None).await
}

async fn cmd_move(ctx: &Context, to: String, from: Option<String>) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let branch = resolve_branch(&engine, from.as_deref())?;
    let new_parent = BranchName::new(to)?;
    run_and_report(&engine, "move", Intent::Move { branch, new_parent }, None).await
}

async fn cmd_sync(ctx: &Context, all: bool, from_main: bool, r#continue: bool, abort: bool) -> Result<()> {
    let engine = Engine::open(ctx)?;
    if abort {
        engine.abort_suspended()?;
        println!("Aborted suspended operation.");
        return Ok(());
    }
    if r#continue {
        return match engine.continue_suspended(None).await? {
            ExecuteResult::Success => {
                println!("Continued and completed.");
                Ok(())
            }
            ExecuteResult::Paused { branch, .. } => {
                bail!("still conflicted on {branch}; resolve and run `pk sync --continue` again")
            }
        };
    }
    if from_main {
        engine.git.fetch(&engine.config.repository.remote)?;
    }
    let file = engine.store.load()?;
    let graph = load_graph(&file);
    let root = if all {
        file.main_branch.clone()
    } else {
        resolve_branch(&engine, None)?
    };
    let from = if all {
        graph.children(&root).first().cloned().unwrap_or(root)
    } else {
        root
    };
    run_and_report(&engine, "sync", Intent::Restack { from }, None).await
}

async fn cmd_commit(ctx: &Context, message: Option<String>, amend: bool, all: bool) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let mut args = vec!["commit".to_string()];
    if all {
        args.push("-a".to_string());
    }
    if amend {
        args.push("--amend".to_string());
        if message.is_none() {
            args.push("--no-edit".to_string());
        }
    }
    if let Some(m) = &message {
        args.push("-m".to_string());
        args.push(m.clone());
    }
    let status = std::process::Command::new("git")
        .args(&args)
        .current_dir(engine.git.info()?.work_dir)
        .status()
        .context("failed to run git commit")?;
    if !status.success() {
        bail!("git commit failed");
    }
    let current = resolve_branch(&engine, None)?;
    let head = engine.git.head_oid()?;
    let mut file = engine.store.load()?;
    if let Some(entry) = file.find_mut(&current) {
        entry.head = head;
        engine.store.save_and_mirror(&file, &engine.git)?;
    }
    Ok(())
}

fn open_forge(engine: &Engine) -> Result<Box<dyn Forge>> {
    let remote = engine
        .git
        .remote_url(&engine.config.repository.remote)?
        .ok_or_else(|| anyhow!("no '{}' remote configured", engine.config.repository.remote))?;
    let token = engine
        .config
        .resolve_api_token()
        .ok_or_else(|| anyhow!("no forge API token configured (set it in .pancake/config or GITHUB_TOKEN)"))?;
    create_forge(&remote, &token, None).map_err(|e| anyhow!(e.to_string()))
}

async fn cmd_submit(ctx: &Context, all: bool, from: Option<String>, draft: bool, _no_edit: bool) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let forge = open_forge(&engine)?;
    let file = engine.store.load()?;
    let graph = load_graph(&file);
    let start = if let Some(q) = from.or_else(|| if all { Some(file.main_branch.to_string()) } else { None }) {
        BranchName::new(q)?
    } else {
        resolve_branch(&engine, None)?
    };

    let branches: Vec<BranchName> = if all {
        let mut v = vec![start.clone()];
        v.extend(graph.descendants(&start));
        v
    } else {
        vec![start]
    };

    let mut plan = Plan::new("submit");
    for branch in &branches {
        if branch == &file.main_branch {
            continue;
        }
        let Some(entry) = file.find(branch) else { continue };
        let parent = graph.parent(branch).cloned().unwrap_or_else(|| file.main_branch.clone());
        plan = plan.with_step(PlanStep::Push { branch: branch.clone() });
        if entry.pr.is_some() {
            plan = plan.with_step(PlanStep::ForgeUpdatePr { branch: branch.clone() });
        } else {
            plan = plan.with_step(PlanStep::ForgeCreatePr { branch: branch.clone(), base: parent, draft });
        }
    }
    plan = plan.with_step(PlanStep::CommitMetadata);
    run_and_report(&engine, "submit", plan, Some(forge.as_ref())).await
}

async fn cmd_push(ctx: &Context, all: bool, no_pr: bool) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let current = resolve_branch(&engine, None)?;
    let file = engine.store.load()?;
    let graph = load_graph(&file);
    let branches = if all {
        let mut v = vec![current.clone()];
        v.extend(graph.descendants(&current));
        v
    } else {
        vec![current]
    };
    let mut plan = Plan::new("push");
    for branch in branches {
        plan = plan.with_step(PlanStep::Push { branch });
    }
    if no_pr {
        run_and_report(&engine, "push", plan, None).await
    } else {
        let forge = open_forge(&engine).ok();
        run_and_report(&engine, "push", plan, forge.as_deref()).await
    }
}

async fn cmd_land(ctx: &Context, squash: bool, merge: bool, rebase: bool, all: bool) -> Result<()> {
    // squash/merge/rebase pick GitHub/GitLab's merge-button behavior; the
    // forge binding's narrow update-pr surface has no merge-method field,
    // so the distinction is left to the forge's own repo-level default.
    let _ = (squash, merge, rebase);
    let engine = Engine::open(ctx)?;
    let forge = open_forge(&engine)?;

    let current = resolve_branch(&engine, None)?;
    let file = engine.store.load()?;
    let graph = load_graph(&file);
    let order = {
        let mut v = vec![graph.bottom_of(&current)];
        v.extend(graph.descendants(&v[0]));
        v
    };
    let branches: Vec<BranchName> = if all { order } else { vec![current] };

    for branch in branches {
        let Some(entry) = file.find(&branch) else { continue };
        let Some(pr) = &entry.pr else {
            println!("{branch} has no open PR, skipping");
            continue;
        };
        let request = crate::forge::UpdatePrRequest {
            state: Some(crate::forge::PrState::Merged),
            ..Default::default()
        };
        forge.update_pr(pr.id, request).await.map_err(|e| anyhow!(e.to_string()))?;
        println!("Merged {branch} (#{})", pr.id);
        engine
            .run("land", Intent::DeleteBranch { name: branch.clone() }, Some(forge.as_ref()))
            .await
            .with_context(|| format!("merged {branch} but failed to untrack it locally"))?;
    }
    Ok(())
}

async fn cmd_pr(ctx: &Context, action: PrAction) -> Result<()> {
    let engine = Engine::open(ctx)?;
    let file = engine.store.load()?;
    match action {
        PrAction::Status { name } => {
            let branch = resolve_branch(&engine, name.as_deref())?;
            match file.find(&branch).and_then(|e| e.pr.as_ref()) {
                Some(pr) => println!("{branch}: #{} {:?} (draft={})", pr.id, pr.status, pr.draft),
                None => println!("{branch} has no tracked PR"),
            }
        }
        PrAction::List => {
            for entry in &file.branches {
                match &entry.pr {
                    Some(pr) => println!("{}: #{} {:?}", entry.name, pr.id, pr.status),
                    None => println!("{}: (no PR)", entry.name),
                }
            }
        }
    }
    Ok(())
}

fn cmd_pull(ctx: &Context) -> Result<()> {
    let engine = Engine::open(ctx)?;
    engine.git.fetch(&engine.config.repository.remote)?;
    println!("Fetched {}", engine.config.repository.remote);
    Ok(())
}

fn cmd_fetch(ctx: &Context) -> Result<()> {
    cmd_pull(ctx)
}

fn cmd_undo(ctx: &Context) -> Result<()> {
    let engine = Engine::open(ctx)?;
    if engine.undo()? {
        println!("Undid the most recent operation.");
    } else {
        println!("Nothing to undo.");
    }
    Ok(())
}

fn cmd_redo(_ctx: &Context) -> Result<()> {
    // Redo does not survive an intervening operation (spec decision,
    // SPEC_FULL §9): with only a single-level undo snapshot kept, there is
    // nothing durable to redo once undo has consumed it.
    println!("Nothing to redo.");
    Ok(())
}

fn cmd_completions(shell: args::Shell) -> Result<()> {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(clap_complete::Shell::from(shell), &mut cmd, name, &mut io::stdout());
    Ok(())
}

async fn run_and_report(
    engine: &Engine,
    command: &str,
    intent_or_plan: impl Into<IntentOrPlan>,
    forge: Option<&dyn Forge>,
) -> Result<()> {
    let result = match intent_or_plan.into() {
        IntentOrPlan::Intent(intent) => engine.run(command, intent, forge).await?,
        IntentOrPlan::Plan(plan) => engine.run_plan(command, plan, forge).await?,
    };
    match result {
        ExecuteResult::Success => {
            println!("{command}: done.");
            Ok(())
        }
        ExecuteResult::Paused { branch, .. } => {
            bail!("{command} stopped on a conflict in {branch}; resolve it then run `pk sync --continue`")
        }
    }
}

enum IntentOrPlan {
    Intent(Intent),
    Plan(Plan),
}

impl From<Intent> for IntentOrPlan {
    fn from(i: Intent) -> Self {
        IntentOrPlan::Intent(i)
    }
}

impl From<Plan> for IntentOrPlan {
    fn from(p: Plan) -> Self {
        IntentOrPlan::Plan(p)
    }
}
