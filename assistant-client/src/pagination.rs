//! Deleting every item of a cursor-paginated listing.
//!
//! The service pages with `after = <id of last item seen>`, so the last item
//! of a page has to survive until the next page has been fetched. Every other
//! item can go immediately.

use log::{debug, info};
use std::fmt;

use crate::api::{ApiResult, AssistantApi, Identified, Page};

/// Decides which listed items may be deleted as pages arrive.
#[derive(Debug)]
pub struct HoldBackDrain<T> {
    held: Option<T>,
    finished: bool,
}

impl<T> Default for HoldBackDrain<T> {
    fn default() -> Self {
        Self {
            held: None,
            finished: false,
        }
    }
}

impl<T> HoldBackDrain<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next page and get back the items that are now safe to delete.
    ///
    /// Whatever was held from the previous page is released first, since the
    /// page just fed was fetched with it as the cursor.
    pub fn accept(&mut self, page: Page<T>) -> Vec<T> {
        let mut release = Vec::with_capacity(page.data.len() + 1);
        release.extend(self.held.take());

        let Page { mut data, has_more } = page;
        match data.pop() {
            None => self.finished = true,
            Some(last) => {
                release.extend(data);
                if has_more {
                    self.held = Some(last);
                } else {
                    release.push(last);
                    self.finished = true;
                }
            }
        }

        release
    }

    /// The item the next page must be fetched after.
    pub fn cursor(&self) -> Option<&T> {
        self.held.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Account-wide resource listings that can be drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Assistant,
    File,
    VectorStore,
}

impl ResourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::File => "file",
            Self::VectorStore => "vector store",
        }
    }
}

/// A listed resource awaiting deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Listed {
    id: String,
    name: Option<String>,
}

impl fmt::Display for Listed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.id, name),
            None => f.write_str(&self.id),
        }
    }
}

fn listed<T: Identified>(page: Page<T>) -> Page<Listed> {
    Page::new(
        page.data
            .iter()
            .map(|item| Listed {
                id: item.id().to_string(),
                name: item.display_name().map(str::to_string),
            })
            .collect(),
        page.has_more,
    )
}

async fn list_page<A: AssistantApi + ?Sized>(
    api: &A,
    kind: ResourceKind,
    after: Option<&str>,
) -> ApiResult<Page<Listed>> {
    Ok(match kind {
        ResourceKind::Assistant => listed(api.list_assistants(after).await?),
        ResourceKind::File => listed(api.list_files(after).await?),
        ResourceKind::VectorStore => listed(api.list_vector_stores(after).await?),
    })
}

async fn delete_one<A: AssistantApi + ?Sized>(
    api: &A,
    kind: ResourceKind,
    id: &str,
) -> ApiResult<()> {
    match kind {
        ResourceKind::Assistant => api.delete_assistant(id).await,
        ResourceKind::File => api.delete_file(id).await,
        ResourceKind::VectorStore => api.delete_vector_store(id).await,
    }
}

/// Delete every `kind` resource visible to the credential, page by page.
///
/// Stops at the first failed call. Returns how many resources were deleted.
pub async fn drain_listing<A: AssistantApi + ?Sized>(
    api: &A,
    kind: ResourceKind,
) -> ApiResult<usize> {
    let mut drain: HoldBackDrain<Listed> = HoldBackDrain::new();
    let mut deleted = 0;

    while !drain.is_finished() {
        let after = drain.cursor().map(|item| item.id.clone());
        let page = list_page(api, kind, after.as_deref()).await?;
        debug!(
            "Fetched {} {} id(s) after {:?} (more: {})",
            page.data.len(),
            kind.label(),
            after,
            page.has_more
        );

        for item in drain.accept(page) {
            info!("Deleting {} {}", kind.label(), item);
            delete_one(api, kind, &item.id).await?;
            deleted += 1;
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FileObject;

    fn page(ids: &[&str], has_more: bool) -> Page<String> {
        Page::new(ids.iter().map(|s| s.to_string()).collect(), has_more)
    }

    #[test]
    fn test_single_page_releases_everything() {
        let mut drain = HoldBackDrain::new();
        let released = drain.accept(page(&["a", "b", "c"], false));
        assert_eq!(released, vec!["a", "b", "c"]);
        assert!(drain.is_finished());
        assert!(drain.cursor().is_none());
    }

    #[test]
    fn test_last_item_held_until_next_page() {
        let mut drain = HoldBackDrain::new();

        let released = drain.accept(page(&["a", "b"], true));
        assert_eq!(released, vec!["a"]);
        assert_eq!(drain.cursor().map(String::as_str), Some("b"));
        assert!(!drain.is_finished());

        let released = drain.accept(page(&["c", "d"], true));
        assert_eq!(released, vec!["b", "c"]);
        assert_eq!(drain.cursor().map(String::as_str), Some("d"));

        let released = drain.accept(page(&["e"], false));
        assert_eq!(released, vec!["d", "e"]);
        assert!(drain.is_finished());
    }

    #[test]
    fn test_empty_page_releases_held_item() {
        let mut drain = HoldBackDrain::new();
        drain.accept(page(&["a"], true));

        let released = drain.accept(page(&[], false));
        assert_eq!(released, vec!["a"]);
        assert!(drain.is_finished());
    }

    #[test]
    fn test_empty_listing() {
        let mut drain: HoldBackDrain<String> = HoldBackDrain::new();
        assert!(drain.accept(page(&[], false)).is_empty());
        assert!(drain.is_finished());
    }

    #[test]
    fn test_listed_items_carry_names() {
        let files: Page<FileObject> = serde_json::from_str(
            r#"{"data":[{"id":"file_1","filename":"book.pdf"},{"id":"file_2"}],"has_more":true}"#,
        )
        .unwrap();

        let page = listed(files);
        assert!(page.has_more);
        assert_eq!(page.data[0].to_string(), "file_1 (book.pdf)");
        assert_eq!(page.data[1].to_string(), "file_2");
    }
}
