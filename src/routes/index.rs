use crate::{page::Page, server::SharedState};
use axum::{extract::State, response::Html};

pub async fn index(State(state): State<SharedState>) -> Html<String> {
    let page = Page {
        upload: state.upload_store.last_upload(),
        ..Page::default()
    };
    Html(page.render())
}
