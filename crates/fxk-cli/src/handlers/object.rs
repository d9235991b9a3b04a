//! Object command handlers

use super::{build_transport, with_spinner};
use crate::cli::{ObjectAction, ObjectArgs, ObjectGetArgs, ObjectListArgs};
use crate::error::Result;
use crate::logging::timing::Timer;
use crate::output::{format_value_compact, OutputWriter};
use fxk_core::{GetOptions, ListOptions, ObjectClient, ObjectPage, ProfileStore};
use serde_json::Value;

/// Handle the object command
pub async fn handle_object(args: ObjectArgs, store: &ProfileStore, output: &mut OutputWriter) -> Result<()> {
    let client = ObjectClient::new(store.clone(), build_transport(store)?);
    match args.action {
        ObjectAction::List(list_args) => handle_list(list_args, &client, output).await,
        ObjectAction::Get(get_args) => handle_get(get_args, &client, output).await,
    }
}

async fn handle_list(args: ObjectListArgs, client: &ObjectClient, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::with_details("object_list", args.object_type.as_deref().unwrap_or("all"));
    let options = ListOptions {
        object_type: args.object_type,
        page_size: Some(args.page_size),
        page_number: Some(args.page_number),
    };

    let result = with_spinner(output, "Fetching objects...", client.list_objects(&options)).await;
    output.normalized(&result)?;
    let page = result.into_result()?;

    if output.is_human() {
        render_page(&page, output)?;
    }
    Ok(())
}

async fn handle_get(args: ObjectGetArgs, client: &ObjectClient, output: &mut OutputWriter) -> Result<()> {
    let _timer = Timer::with_details("object_get", &args.id);
    let options = GetOptions {
        object_type: args.object_type,
    };

    let result = with_spinner(output, "Fetching object...", client.get_object(&args.id, &options)).await;
    output.normalized(&result)?;
    let object = result.into_result()?;

    if output.is_human() {
        output.data(&object)?;
    }
    Ok(())
}

fn render_page(page: &ObjectPage, output: &mut OutputWriter) -> Result<()> {
    if page.objects.is_empty() {
        return output.info("No objects found");
    }

    let rows = page
        .objects
        .iter()
        .map(|object| {
            vec![
                cell(object, &["id", "_id", "apiName", "api_name"]),
                cell(object, &["name", "displayName", "display_name"]),
                cell(object, &["objectType", "object_type", "type"]),
                cell(object, &["createdAt", "create_time", "createTime"]),
            ]
        })
        .collect();
    output.table(&["ID", "Name", "Type", "Created"], rows)?;

    output.info(&page_summary(page))
}

/// Counts line under the table, with a next-page hint when there is one
fn page_summary(page: &ObjectPage) -> String {
    let mut summary = format!(
        "Showing {} of {} (page {}, {} per page)",
        page.objects.len(),
        page.total_count,
        page.page_number,
        page.page_size
    );
    if let Some(next) = page.has_more.then(|| page.page_number.checked_add(1)).flatten() {
        summary.push_str(&format!("; next: --page {}", next));
    }
    summary
}

/// First present field among `keys`, rendered for a table cell
fn cell(object: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
        .map(format_value_compact)
        .unwrap_or_else(|| "-".to_string())
}
