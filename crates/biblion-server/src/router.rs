//! Request routing

use hyper::Method;

/// Every endpoint the service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
	CreateAccount,
	Login,
	ListBooks,
	CreateBook,
	BeginTransaction,
	LoanAction(i64),
	ReturnAction(i64),
	CommitTransaction(i64),
	RollbackTransaction(i64),
	PoolStatus,
}

/// Match a method/path pair to a route. `None` is a 404.
pub fn route(method: &Method, path: &str) -> Option<Route> {
	let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
	match (method, segments.as_slice()) {
		(&Method::POST, ["accounts"]) => Some(Route::CreateAccount),
		(&Method::POST, ["login"]) => Some(Route::Login),
		(&Method::GET, ["books"]) => Some(Route::ListBooks),
		(&Method::POST, ["books"]) => Some(Route::CreateBook),
		(&Method::POST, ["transactions"]) => Some(Route::BeginTransaction),
		(&Method::PUT, ["transactions", id, "loan"]) => {
			id.parse().ok().map(Route::LoanAction)
		}
		(&Method::PUT, ["transactions", id, "return"]) => {
			id.parse().ok().map(Route::ReturnAction)
		}
		(&Method::POST, ["transactions", id, "commit"]) => {
			id.parse().ok().map(Route::CommitTransaction)
		}
		(&Method::POST, ["transactions", id, "rollback"]) => {
			id.parse().ok().map(Route::RollbackTransaction)
		}
		(&Method::GET, ["status"]) => Some(Route::PoolStatus),
		_ => None,
	}
}
