//! Drives the form UI end to end: storyboard, edit dialogue, render, download.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::header::{
    CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, ETAG, IF_NONE_MATCH, LOCATION, SET_COOKIE,
};
use axum::http::{Request, StatusCode};
use common::{Behaviour, MockApi, solid_png};
use fourcut::web::{AppState, create_router};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
        .to_vec()
}

fn between<'a>(body: &'a str, start: &str, end: char) -> &'a str {
    let from = body.find(start).expect("marker") + start.len();
    body[from..].split(end).next().expect("value")
}

fn multipart(boundary: &str, fields: &[(&str, &str)], photo: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(photo);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Opens the form, returning the session cookie and its CSRF token.
async fn start_session(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .expect("session cookie")
        .to_string();
    let home = String::from_utf8(read_body(response).await).expect("utf8");
    let csrf = between(&home, "name=\"csrf_token\" value=\"", '"').to_string();
    (cookie, csrf)
}

/// Posts the upload form and returns the run's location.
async fn create_run(app: &Router, cookie: &str, fields: &[(&str, &str)]) -> String {
    let boundary = "fourcutboundary";
    let request = Request::post("/comics")
        .header(COOKIE, cookie)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart(
            boundary,
            fields,
            &solid_png([200, 180, 160], 48, 48),
        )))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location")
        .to_string();
    assert!(location.starts_with("/comics/"));
    location
}

fn render_request(location: &str, cookie: &str, form: String) -> Request<Body> {
    Request::post(format!("{location}/render"))
        .header(COOKIE, cookie)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .expect("request")
}

#[tokio::test]
async fn upload_edit_render_and_download() {
    let mock = MockApi::start(Behaviour::default()).await;
    let app = create_router(AppState::new(
        mock.model_config(),
        reqwest::Client::new(),
        None,
    ));

    let (cookie, csrf) = start_session(&app).await;
    let location = create_run(
        &app,
        &cookie,
        &[
            ("csrf_token", csrf.as_str()),
            ("story", "I overslept and raced to work."),
            ("layout", "C"),
            ("style", "Pixel art style"),
            ("bubble_style", "cloud"),
            ("quality", "hd"),
            ("image_style", "natural"),
        ],
    )
    .await;

    let response = app
        .clone()
        .oneshot(
            Request::get(&location)
                .header(COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let page = String::from_utf8(read_body(response).await).expect("utf8");
    assert!(page.contains("Storyboard ready."));
    assert!(page.contains("Oh no, I overslept!"));
    assert!(page.contains("Layout:</strong> C"));
    assert!(page.contains("only available as a download"));

    // edit the dialogue and render
    let form = format!("csrf_token={csrf}&dialogue_1=Five+more+minutes&dialogue_4=");
    let response = app
        .clone()
        .oneshot(render_request(&location, &cookie, form))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .clone()
        .oneshot(
            Request::get(&location)
                .header(COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let page = String::from_utf8(read_body(response).await).expect("utf8");
    assert!(page.contains("Your comic is ready."));
    assert!(page.contains("Five more minutes"));
    assert!(page.contains(&format!("{location}/comic.png")));
    assert!(page.contains(&format!("{location}/panels/4.png")));

    // the edited dialogue went to the prompt writer
    let prompt_request = mock.chat_bodies()[2].to_string();
    assert!(prompt_request.contains("Five more minutes"));
    assert!(prompt_request.contains("Pixel art style"));

    // the advanced options reached the image API
    let image_bodies = mock.image_bodies();
    // panel 2 is retried once
    assert_eq!(image_bodies.len(), 5);
    for body in &image_bodies {
        assert_eq!(body["quality"], "hd");
        assert_eq!(body["style"], "natural");
    }

    // downloads
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("{location}/comic.png"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_DISPOSITION).expect("disposition"),
        "attachment; filename=\"comic_C.png\""
    );
    let etag = response.headers().get(ETAG).expect("etag").clone();
    let png = read_body(response).await;
    let comic = fourcut::render::decode_rgb(&png).expect("png");
    assert_eq!(comic.dimensions(), (2048, 2048));

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("{location}/comic.png"))
                .header(IF_NONE_MATCH, etag)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("{location}/panels/2.png"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let panel = fourcut::render::decode_rgb(&read_body(response).await).expect("png");
    assert_eq!(panel.dimensions(), (64, 64));

    // the home page links back to the run
    let response = app
        .oneshot(
            Request::get("/")
                .header(COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let home = String::from_utf8(read_body(response).await).expect("utf8");
    assert!(home.contains(&format!("href=\"{location}\"")));
}

#[tokio::test]
async fn other_sessions_cannot_open_or_render_a_run() {
    let mock = MockApi::start(Behaviour::default()).await;
    let mut model = mock.model_config();
    // users bring their own keys
    model.api_key = None;
    let app = create_router(AppState::new(model, reqwest::Client::new(), None));

    let (owner_cookie, owner_csrf) = start_session(&app).await;
    let location = create_run(
        &app,
        &owner_cookie,
        &[
            ("csrf_token", owner_csrf.as_str()),
            ("api_key", "sk-user-a"),
            ("story", "I overslept and raced to work."),
        ],
    )
    .await;
    let chat_calls = mock.chat_bodies().len();

    let (other_cookie, other_csrf) = start_session(&app).await;
    assert_ne!(owner_cookie, other_cookie);

    let response = app
        .clone()
        .oneshot(
            Request::get(&location)
                .header(COOKIE, &other_cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(render_request(
            &location,
            &other_cookie,
            format!("csrf_token={other_csrf}&dialogue_1=mine+now"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(mock.image_bodies().is_empty());
    assert_eq!(mock.chat_bodies().len(), chat_calls);

    // the owner still can
    let response = app
        .oneshot(render_request(
            &location,
            &owner_cookie,
            format!("csrf_token={owner_csrf}"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).expect("location"),
        location.as_str()
    );
    assert_eq!(mock.image_bodies().len(), 5);
}
