//! HTTP handlers
//!
//! Thin JSON adapters over the catalogue: parse the request, call the
//! domain layer, map the outcome to a status code. The handlers are
//! generic over the body type so tests can drive them with `Full<Bytes>`
//! requests instead of a live socket.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{HeaderMap, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use biblion_catalogue::CatalogueError;

use crate::router::{self, Route};
use crate::state::{AppState, TransactionSession};

type HttpResponse = Response<Full<Bytes>>;

#[derive(Deserialize)]
struct Credentials {
	username: String,
	password: String,
}

#[derive(Deserialize)]
struct NewBook {
	title: String,
	author: String,
}

#[derive(Deserialize, Default)]
struct BeginTransactionRequest {
	timeout_ms: Option<u64>,
	lock_wait_ms: Option<u64>,
}

#[derive(Deserialize)]
struct BookAction {
	book_id: i64,
}

#[derive(Deserialize, Default)]
struct SearchQuery {
	title: Option<String>,
	author: Option<String>,
}

/// Entry point for one request.
pub async fn handle<B>(state: Arc<AppState>, req: Request<B>) -> HttpResponse
where
	B: Body,
	B::Error: std::fmt::Display,
{
	let method = req.method().clone();
	let path = req.uri().path().to_string();
	let query = req.uri().query().map(str::to_string);
	let headers = req.headers().clone();

	let Some(route) = router::route(&method, &path) else {
		return error_response(StatusCode::NOT_FOUND, "no such endpoint");
	};

	let body = match req.into_body().collect().await {
		Ok(collected) => collected.to_bytes(),
		Err(err) => {
			return error_response(
				StatusCode::BAD_REQUEST,
				&format!("failed to read request body: {err}"),
			);
		}
	};

	match dispatch(&state, route, &headers, query.as_deref(), &body).await {
		Ok(response) => response,
		Err(response) => response,
	}
}

/// Handlers return `Err(response)` for early exits (auth failures, parse
/// errors); both arms are full responses.
async fn dispatch(
	state: &AppState,
	route: Route,
	headers: &HeaderMap,
	query: Option<&str>,
	body: &Bytes,
) -> Result<HttpResponse, HttpResponse> {
	match route {
		Route::CreateAccount => create_account(state, body).await,
		Route::Login => login(state, body).await,
		Route::ListBooks => list_books(state, query).await,
		Route::CreateBook => create_book(state, headers, body).await,
		Route::BeginTransaction => begin_transaction(state, headers, body).await,
		Route::LoanAction(tx) => loan_action(state, headers, tx, body).await,
		Route::ReturnAction(tx) => return_action(state, headers, tx, body).await,
		Route::CommitTransaction(tx) => end_transaction(state, headers, tx, true).await,
		Route::RollbackTransaction(tx) => end_transaction(state, headers, tx, false).await,
		Route::PoolStatus => pool_status(state).await,
	}
}

async fn create_account(state: &AppState, body: &Bytes) -> Result<HttpResponse, HttpResponse> {
	let credentials: Credentials = parse_json(body)?;
	let account = state
		.catalogue
		.register_account(&credentials.username, &credentials.password)
		.await
		.map_err(catalogue_error_response)?;
	Ok(json_response(StatusCode::CREATED, &account))
}

async fn login(state: &AppState, body: &Bytes) -> Result<HttpResponse, HttpResponse> {
	let credentials: Credentials = parse_json(body)?;
	let account = state
		.catalogue
		.authenticate(&credentials.username, &credentials.password)
		.await
		.map_err(catalogue_error_response)?;
	match account {
		Some(account) => {
			let token = state.tokens.issue(account.id);
			Ok(json_response(
				StatusCode::OK,
				&json!({ "token": token, "account_id": account.id }),
			))
		}
		None => Err(error_response(
			StatusCode::UNAUTHORIZED,
			"invalid credentials",
		)),
	}
}

async fn list_books(state: &AppState, query: Option<&str>) -> Result<HttpResponse, HttpResponse> {
	let search: SearchQuery = serde_urlencoded::from_str(query.unwrap_or(""))
		.map_err(|err| error_response(StatusCode::BAD_REQUEST, &format!("bad query: {err}")))?;
	let books = state
		.catalogue
		.search_books(search.title.as_deref(), search.author.as_deref())
		.await
		.map_err(catalogue_error_response)?;
	Ok(json_response(StatusCode::OK, &books))
}

async fn create_book(
	state: &AppState,
	headers: &HeaderMap,
	body: &Bytes,
) -> Result<HttpResponse, HttpResponse> {
	bearer_account(state, headers)?;
	let new_book: NewBook = parse_json(body)?;
	let book = state
		.catalogue
		.add_book(&new_book.title, &new_book.author)
		.await
		.map_err(catalogue_error_response)?;
	Ok(json_response(StatusCode::CREATED, &book))
}

async fn begin_transaction(
	state: &AppState,
	headers: &HeaderMap,
	body: &Bytes,
) -> Result<HttpResponse, HttpResponse> {
	let account_id = bearer_account(state, headers)?;
	let request: BeginTransactionRequest = if body.is_empty() {
		BeginTransactionRequest::default()
	} else {
		parse_json(body)?
	};

	let transaction_id = state
		.catalogue
		.pool()
		.begin_transaction(
			request.timeout_ms.map(Duration::from_millis),
			request.lock_wait_ms.map(Duration::from_millis),
		)
		.await
		.map_err(|err| catalogue_error_response(err.into()))?;

	state.sessions.insert(
		transaction_id,
		TransactionSession {
			account_id,
			actions_applied: 0,
		},
	);
	Ok(json_response(
		StatusCode::CREATED,
		&json!({ "transaction": transaction_id }),
	))
}

async fn loan_action(
	state: &AppState,
	headers: &HeaderMap,
	transaction_id: i64,
	body: &Bytes,
) -> Result<HttpResponse, HttpResponse> {
	let account_id = bearer_account(state, headers)?;
	check_session(state, transaction_id, account_id)?;
	let action: BookAction = parse_json(body)?;

	let loan = state
		.catalogue
		.loan_book(transaction_id, action.book_id, account_id)
		.await
		.map_err(catalogue_error_response)?;
	record_action(state, transaction_id);
	Ok(json_response(StatusCode::OK, &loan))
}

async fn return_action(
	state: &AppState,
	headers: &HeaderMap,
	transaction_id: i64,
	body: &Bytes,
) -> Result<HttpResponse, HttpResponse> {
	let account_id = bearer_account(state, headers)?;
	check_session(state, transaction_id, account_id)?;
	let action: BookAction = parse_json(body)?;

	state
		.catalogue
		.return_book(transaction_id, action.book_id)
		.await
		.map_err(catalogue_error_response)?;
	record_action(state, transaction_id);
	Ok(json_response(
		StatusCode::OK,
		&json!({ "book_id": action.book_id, "returned": true }),
	))
}

async fn end_transaction(
	state: &AppState,
	headers: &HeaderMap,
	transaction_id: i64,
	should_commit: bool,
) -> Result<HttpResponse, HttpResponse> {
	let account_id = bearer_account(state, headers)?;
	check_session(state, transaction_id, account_id)?;

	let committed = state
		.catalogue
		.pool()
		.end_transaction(transaction_id, should_commit)
		.await
		.map_err(|err| catalogue_error_response(err.into()))?;

	let actions_applied = state
		.sessions
		.remove(&transaction_id)
		.map(|(_, session)| session.actions_applied)
		.unwrap_or(0);
	Ok(json_response(
		StatusCode::OK,
		&json!({ "committed": committed, "actions_applied": actions_applied }),
	))
}

async fn pool_status(state: &AppState) -> Result<HttpResponse, HttpResponse> {
	let status = state.catalogue.pool().status().await;
	Ok(json_response(
		StatusCode::OK,
		&json!({ "connections": { "total": status.total, "bound": status.bound } }),
	))
}

/// Resolve the bearer token to an account, or fail with 401.
fn bearer_account(state: &AppState, headers: &HeaderMap) -> Result<i64, HttpResponse> {
	headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.and_then(|token| state.tokens.resolve(token))
		.ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "missing or invalid bearer token"))
}

/// The transaction must have been begun through this server, by this
/// account.
fn check_session(
	state: &AppState,
	transaction_id: i64,
	account_id: i64,
) -> Result<(), HttpResponse> {
	match state.sessions.get(&transaction_id) {
		None => Err(error_response(
			StatusCode::NOT_FOUND,
			&format!("transaction {transaction_id} is unknown or already finished"),
		)),
		Some(session) if session.account_id != account_id => Err(error_response(
			StatusCode::FORBIDDEN,
			"transaction belongs to another account",
		)),
		Some(_) => Ok(()),
	}
}

fn record_action(state: &AppState, transaction_id: i64) {
	if let Some(mut session) = state.sessions.get_mut(&transaction_id) {
		session.actions_applied += 1;
	}
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, HttpResponse> {
	serde_json::from_slice(body)
		.map_err(|err| error_response(StatusCode::BAD_REQUEST, &format!("bad request body: {err}")))
}

fn catalogue_error_response(err: CatalogueError) -> HttpResponse {
	let status = match &err {
		CatalogueError::BookNotFound(_) | CatalogueError::UnknownTransaction(_) => {
			StatusCode::NOT_FOUND
		}
		CatalogueError::BookUnavailable(_)
		| CatalogueError::BookNotLoaned(_)
		| CatalogueError::DuplicateAccount(_) => StatusCode::CONFLICT,
		CatalogueError::PasswordHash(_)
		| CatalogueError::MalformedRecord(_)
		| CatalogueError::Pool(_) => {
			tracing::error!(error = %err, "catalogue operation failed");
			StatusCode::INTERNAL_SERVER_ERROR
		}
	};
	error_response(status, &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
	let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
	Response::builder()
		.status(status)
		.header(CONTENT_TYPE, "application/json")
		.body(Full::new(Bytes::from(body)))
		.expect("static response parts are valid")
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
	json_response(status, &json!({ "error": message }))
}
