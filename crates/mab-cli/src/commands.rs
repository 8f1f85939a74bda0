//! Command implementations
//!
//! Each command drives the session, waits for it to settle, and writes a
//! human-readable report to `out`.

use anyhow::{anyhow, bail, Context, Result};
use mab_artifact::{encode_collection, Artifact, ArtifactId, ArtifactStatus};
use mab_core::{Catalog, SessionController};
use std::io::Write;
use std::path::PathBuf;

/// Resolve a full id or a unique id prefix
pub(crate) fn resolve_id(session: &SessionController, prefix: &str) -> Result<ArtifactId> {
    let prefix = prefix.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        bail!("artifact id must not be empty");
    }

    let matches: Vec<ArtifactId> = session
        .artifacts()
        .iter()
        .map(Artifact::id)
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(anyhow!("no artifact matches '{prefix}'")),
        _ => Err(anyhow!(
            "'{prefix}' is ambiguous ({} artifacts match)",
            matches.len()
        )),
    }
}

fn summary(artifact: &Artifact) -> String {
    format!(
        "{}  {:<8}  {}  {}",
        artifact.id().short(),
        artifact.status(),
        artifact.created_at().format("%Y-%m-%d %H:%M"),
        artifact.instruction()
    )
}

fn report(out: &mut impl Write, artifact: &Artifact) -> Result<()> {
    writeln!(out, "{}", summary(artifact))?;
    match artifact.status() {
        ArtifactStatus::Failed => {
            writeln!(out, "  {}", artifact.failure_reason().unwrap_or("failed"))?;
        }
        _ => {
            if let Some(turn) = artifact.history().last() {
                writeln!(out, "  {}: {}", turn.speaker, turn.text)?;
            }
        }
    }
    Ok(())
}

async fn finish(session: &SessionController, id: ArtifactId, out: &mut impl Write) -> Result<()> {
    session.settle(id).await;
    session.flush().await;
    let artifact = session
        .artifact(id)
        .ok_or_else(|| anyhow!("artifact {} disappeared", id.short()))?;
    report(out, &artifact)
}

pub(crate) async fn create(
    session: &SessionController,
    instruction: &str,
    out: &mut impl Write,
) -> Result<()> {
    let id = session.create(instruction)?;
    finish(session, id, out).await
}

pub(crate) async fn template(
    session: &SessionController,
    template_id: &str,
    out: &mut impl Write,
) -> Result<()> {
    let template = Catalog::find(template_id)
        .ok_or_else(|| anyhow!("unknown template: {template_id}"))?;
    if template.gated && !session.refresh_entitlement().await {
        bail!(
            "'{}' is a premium template; run `mab entitlement purchase` or `mab entitlement restore`",
            template.label
        );
    }
    let id = session.create_from_template(template)?;
    finish(session, id, out).await
}

pub(crate) fn templates(tag: Option<&str>, out: &mut impl Write) -> Result<()> {
    let listed = match tag {
        Some(tag) => Catalog::tagged(tag),
        None => Catalog::list().iter().collect(),
    };
    for t in listed {
        let marker = if t.gated { "pro" } else { "free" };
        writeln!(out, "{:>2}  {:<20}  [{marker}]  {}", t.id, t.label, t.tags.join(", "))?;
        writeln!(out, "    {}", t.description)?;
    }
    Ok(())
}

pub(crate) fn suggestions(out: &mut impl Write) -> Result<()> {
    for s in Catalog::suggestions() {
        writeln!(out, "{:<12}  {}", s.category, s.text)?;
    }
    Ok(())
}

pub(crate) fn list(session: &SessionController, json: bool, out: &mut impl Write) -> Result<()> {
    let artifacts = session.artifacts();
    if json {
        let bytes = encode_collection(&artifacts)?;
        out.write_all(&bytes)?;
        writeln!(out)?;
        return Ok(());
    }

    if artifacts.is_empty() {
        writeln!(out, "no artifacts yet; try `mab create \"a pomodoro timer\"`")?;
    }
    for artifact in &artifacts {
        writeln!(out, "{}", summary(artifact))?;
    }
    Ok(())
}

pub(crate) fn show(
    session: &SessionController,
    prefix: &str,
    body: bool,
    out: &mut impl Write,
) -> Result<()> {
    let id = resolve_id(session, prefix)?;
    let artifact = session
        .artifact(id)
        .ok_or_else(|| anyhow!("no artifact matches '{prefix}'"))?;

    if body {
        writeln!(out, "{}", artifact.body())?;
        return Ok(());
    }

    writeln!(out, "id:          {}", artifact.id())?;
    writeln!(out, "instruction: {}", artifact.instruction())?;
    if let Some(seed) = artifact.seed_instruction() {
        writeln!(out, "seed:        {seed}")?;
    }
    writeln!(out, "status:      {}", artifact.status())?;
    writeln!(out, "created:     {}", artifact.created_at().to_rfc3339())?;
    if let Some(reason) = artifact.failure_reason() {
        writeln!(out, "failure:     {reason}")?;
    }
    writeln!(out, "body:        {} bytes", artifact.body().len())?;
    if !artifact.history().is_empty() {
        writeln!(out, "history:")?;
        for turn in artifact.history() {
            writeln!(out, "  {}: {}", turn.speaker, turn.text)?;
        }
    }
    Ok(())
}

pub(crate) async fn edit(
    session: &SessionController,
    prefix: &str,
    instruction: &str,
    out: &mut impl Write,
) -> Result<()> {
    let id = resolve_id(session, prefix)?;
    if session.artifact(id).map(|a| a.status()) == Some(ArtifactStatus::Failed) {
        bail!("artifact {} failed to generate and cannot be edited", id.short());
    }
    session.edit(id, instruction)?;
    finish(session, id, out).await
}

pub(crate) async fn remove(
    session: &SessionController,
    prefix: &str,
    yes: bool,
    out: &mut impl Write,
) -> Result<()> {
    let id = resolve_id(session, prefix)?;
    if !yes {
        bail!("refusing to remove {} without --yes", id.short());
    }
    session.remove(id);
    session.flush().await;
    writeln!(out, "removed {}", id.short())?;
    Ok(())
}

pub(crate) fn export(
    session: &SessionController,
    prefix: &str,
    path: Option<PathBuf>,
    out: &mut impl Write,
) -> Result<()> {
    let id = resolve_id(session, prefix)?;
    let artifact = session
        .artifact(id)
        .ok_or_else(|| anyhow!("no artifact matches '{prefix}'"))?;
    if artifact.body().is_empty() {
        bail!("artifact {} has no body to export", id.short());
    }

    let path = path.unwrap_or_else(|| PathBuf::from(format!("{}.html", id.short())));
    std::fs::write(&path, artifact.body())
        .with_context(|| format!("failed to write {}", path.display()))?;
    writeln!(out, "wrote {}", path.display())?;
    Ok(())
}

pub(crate) async fn entitlement_status(
    session: &SessionController,
    out: &mut impl Write,
) -> Result<()> {
    let entitled = session.refresh_entitlement().await;
    writeln!(out, "{}", if entitled { "entitled" } else { "not entitled" })?;
    Ok(())
}

pub(crate) async fn purchase(
    session: &SessionController,
    offer: &str,
    out: &mut impl Write,
) -> Result<()> {
    if !session.purchase(offer).await {
        bail!("purchase of '{offer}' did not grant an entitlement");
    }
    writeln!(out, "purchased {offer}; premium templates unlocked")?;
    Ok(())
}

pub(crate) async fn restore(session: &SessionController, out: &mut impl Write) -> Result<()> {
    if !session.restore_purchases().await {
        bail!("no active purchases to restore");
    }
    writeln!(out, "purchases restored; premium templates unlocked")?;
    Ok(())
}
