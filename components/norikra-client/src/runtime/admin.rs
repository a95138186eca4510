//! Target, field and query administration.
//!
//! These are one-shot pass-through calls: one request to the server, an
//! optional table printed to `out`, nothing kept locally.

// Local crates
use crate::models::models::{FieldDefinition, QueryInfo};
use crate::rpc::service::EventService;
use crate::runtime::errors::CommandError;

// External crates
use tokio::io::{AsyncWrite, AsyncWriteExt};

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> Result<(), CommandError> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}

/// `target list`
pub async fn list_targets<S, W>(service: &S, simple: bool, out: &mut W) -> Result<(), CommandError>
where
    S: EventService,
    W: AsyncWrite + Unpin,
{
    let targets = service.targets().await?;

    if !simple {
        write_line(out, "TARGET").await?;
    }
    for target in &targets {
        write_line(out, &target.name).await?;
    }
    if !simple {
        write_line(out, &format!("{} targets found.", targets.len())).await?;
    }
    out.flush().await?;
    Ok(())
}

/// `target open`
pub async fn open_target<S: EventService>(
    service: &S,
    target: &str,
    fields: &[FieldDefinition],
) -> Result<(), CommandError> {
    tracing::debug!(target_name = %target, fields = fields.len(), "Opening target");
    Ok(service.open(target, fields).await?)
}

/// `target close`
pub async fn close_target<S: EventService>(service: &S, target: &str) -> Result<(), CommandError> {
    tracing::debug!(target_name = %target, "Closing target");
    Ok(service.close(target).await?)
}

/// `field list`
pub async fn list_fields<S, W>(
    service: &S,
    target: &str,
    simple: bool,
    out: &mut W,
) -> Result<(), CommandError>
where
    S: EventService,
    W: AsyncWrite + Unpin,
{
    let fields = service.fields(target).await?;

    if !simple {
        write_line(out, "FIELD\tTYPE\tOPTIONAL").await?;
    }
    for field in &fields {
        let optional = field
            .optional
            .map(|o| o.to_string())
            .unwrap_or_default();
        write_line(out, &format!("{}\t{}\t{}", field.name, field.field_type, optional)).await?;
    }
    if !simple {
        write_line(out, &format!("{} fields found.", fields.len())).await?;
    }
    out.flush().await?;
    Ok(())
}

/// `field add`
pub async fn reserve_field<S: EventService>(
    service: &S,
    target: &str,
    field: &str,
    field_type: &str,
) -> Result<(), CommandError> {
    Ok(service.reserve(target, field, field_type).await?)
}

/// Queries ordered by their first target, then by name.
fn sort_queries(queries: &mut [QueryInfo]) {
    queries.sort_by(|a, b| {
        a.targets
            .first()
            .cmp(&b.targets.first())
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// `query list`
pub async fn list_queries<S, W>(service: &S, simple: bool, out: &mut W) -> Result<(), CommandError>
where
    S: EventService,
    W: AsyncWrite + Unpin,
{
    let mut queries = service.queries().await?;
    sort_queries(&mut queries);

    if !simple {
        write_line(out, "QUERY_NAME\tGROUP\tTARGETS\tQUERY").await?;
    }
    for query in &queries {
        let line = format!(
            "{}\t{}\t{}\t{}",
            query.name,
            query.group.as_deref().unwrap_or("default"),
            query.targets.join(","),
            query.expression
        );
        write_line(out, &line).await?;
    }
    if !simple {
        write_line(out, &format!("{} queries found.", queries.len())).await?;
    }
    out.flush().await?;
    Ok(())
}

/// `query add`
pub async fn register_query<S: EventService>(
    service: &S,
    query_name: &str,
    group: Option<&str>,
    expression: &str,
) -> Result<(), CommandError> {
    tracing::debug!(query_name, group, "Registering query");
    Ok(service.register(query_name, group, expression).await?)
}

/// `query remove`
pub async fn deregister_query<S: EventService>(
    service: &S,
    query_name: &str,
) -> Result<(), CommandError> {
    Ok(service.deregister(query_name).await?)
}
