use std::{collections::VecDeque, io};

use async_trait::async_trait;
use pageowner_client::{Page, PageList, PageUpdate, Space, StatusCode};
use pageowner_migration::{Operator, PageStore};
use parking_lot::Mutex;
use serde_json::json;

/// Build a page the way `GET /pages` returns it, at version 1
pub(crate) fn page(id: &str, owner: &str, space: &str) -> Page {
    serde_json::from_value(json!({
        "id": id,
        "title": format!("Page {id}"),
        "status": "current",
        "ownerId": owner,
        "spaceId": space,
        "version": {"number": 1, "message": ""},
        "_links": {"webui": format!("/spaces/{space}/pages/{id}")}
    }))
    .unwrap()
}

fn api_error(code: StatusCode, message: impl Into<String>) -> pageowner_client::Error {
    pageowner_client::Error::ApiError {
        code,
        message: message.into(),
    }
}

#[derive(Debug, Default)]
struct State {
    spaces: Vec<Space>,
    pages: Vec<Page>,
    /// Page ids whose next write is rejected as if someone else wrote first
    conflicts: Vec<String>,
    /// Zero-based index of the `list_pages` call that fails
    failing_list_call: Option<usize>,
    /// Space lookups are rejected as unauthorized
    failing_space_lookup: bool,
    list_calls: usize,
    reads: usize,
    writes: Vec<String>,
}

/// A page collection held in memory that enforces the server's version rules
///
/// Listing pages hands out offset cursors in `next` links, the same shape the real API uses.
#[derive(Debug, Default)]
pub(crate) struct InMemoryPageStore {
    state: Mutex<State>,
}

impl InMemoryPageStore {
    pub(crate) fn new(pages: impl IntoIterator<Item = Page>) -> Self {
        Self {
            state: Mutex::new(State {
                pages: pages.into_iter().collect(),
                ..Default::default()
            }),
        }
    }

    pub(crate) fn with_space(self, id: &str, key: &str) -> Self {
        self.state.lock().spaces.push(
            serde_json::from_value(json!({"id": id, "key": key, "name": key})).unwrap(),
        );
        self
    }

    pub(crate) fn conflict_on(&self, id: &str) {
        self.state.lock().conflicts.push(id.to_owned());
    }

    pub(crate) fn fail_list_call(&self, call: usize) {
        self.state.lock().failing_list_call = Some(call);
    }

    pub(crate) fn fail_space_lookup(&self) {
        self.state.lock().failing_space_lookup = true;
    }

    pub(crate) fn page(&self, id: &str) -> Page {
        self.state
            .lock()
            .pages
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .unwrap()
    }

    pub(crate) fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }

    pub(crate) fn reads(&self) -> usize {
        self.state.lock().reads
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }
}

#[async_trait]
impl PageStore for InMemoryPageStore {
    async fn spaces_by_key(&self, key: &str) -> pageowner_client::Result<Vec<Space>> {
        let state = self.state.lock();
        if state.failing_space_lookup {
            return Err(api_error(StatusCode::UNAUTHORIZED, "Unauthorized"));
        }
        Ok(state
            .spaces
            .iter()
            .filter(|s| s.key.as_deref() == Some(key))
            .cloned()
            .collect())
    }

    async fn list_pages(
        &self,
        limit: usize,
        cursor: Option<&str>,
    ) -> pageowner_client::Result<PageList> {
        let mut state = self.state.lock();
        let call = state.list_calls;
        state.list_calls += 1;
        if state.failing_list_call == Some(call) {
            return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, "try again later"));
        }

        let offset = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| api_error(StatusCode::BAD_REQUEST, "invalid cursor"))?,
            None => 0,
        };
        let end = (offset + limit).min(state.pages.len());
        let results = state.pages[offset.min(end)..end].to_vec();
        let next = (end < state.pages.len())
            .then(|| format!("/wiki/api/v2/pages?limit={limit}&cursor={end}&sort=id"));

        Ok(serde_json::from_value(json!({
            "results": results,
            "_links": {"next": next}
        }))
        .unwrap())
    }

    async fn get_page(&self, id: &str) -> pageowner_client::Result<Page> {
        let mut state = self.state.lock();
        state.reads += 1;
        state
            .pages
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("page {id} not found")))
    }

    async fn update_page(&self, id: &str, update: &PageUpdate) -> pageowner_client::Result<()> {
        let mut state = self.state.lock();
        state.writes.push(id.to_owned());

        if let Some(pos) = state.conflicts.iter().position(|c| c == id) {
            state.conflicts.remove(pos);
            return Err(api_error(
                StatusCode::CONFLICT,
                "Version must be incremented on update",
            ));
        }
        let page = state
            .pages
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("page {id} not found")))?;
        if update.version.number != page.version.number + 1 {
            return Err(api_error(
                StatusCode::CONFLICT,
                format!(
                    "Version must be incremented on update. Current Version: [{}]",
                    page.version.number
                ),
            ));
        }

        page.owner_id = Some(update.owner_id.clone());
        page.status = update.status.clone();
        page.title = update.title.clone();
        page.version.number = update.version.number;
        page.version.message = Some(update.version.message.clone());
        Ok(())
    }
}

/// Answers prompts from a fixed script and records everything it is told
#[derive(Debug, Default)]
pub(crate) struct ScriptedOperator {
    answers: VecDeque<String>,
    pub(crate) questions: Vec<String>,
    pub(crate) output: Vec<String>,
}

impl ScriptedOperator {
    pub(crate) fn new<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            answers: answers.into_iter().map(str::to_owned).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn said(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }
}

impl Operator for ScriptedOperator {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        self.questions.push(question.to_owned());
        Ok(self.answers.pop_front().unwrap_or_default())
    }

    fn say(&mut self, message: &str) {
        self.output.push(message.to_owned());
    }
}
