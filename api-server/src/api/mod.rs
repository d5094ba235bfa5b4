mod mutation;
mod query;

use crate::models::caller::RequestCaller;
use crate::models::context::ContextPointer;
use async_graphql::http::GraphiQLSource;
use async_graphql::{EmptySubscription, ErrorExtensions, Schema};
use async_graphql_rocket::{GraphQLRequest, GraphQLResponse};
use movie_cache::{Caller, CatalogError};
use mutation::Mutation;
use query::Query;
use rocket::response::content::RawHtml;
use rocket::{Route, State};

pub type ApiSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn build_schema(context: ContextPointer) -> ApiSchema {
    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .data(context)
        .finish()
}

pub fn routes() -> Vec<Route> {
    rocket::routes![graphql_request, graphiql]
}

pub(crate) fn get_context<'ctx>(context: &async_graphql::Context<'ctx>) -> &'ctx ContextPointer {
    context.data_unchecked::<ContextPointer>()
}

pub(crate) fn get_caller<'ctx>(context: &async_graphql::Context<'ctx>) -> Option<&'ctx Caller> {
    context
        .data_opt::<RequestCaller>()
        .and_then(RequestCaller::caller)
}

/// The identified caller, or `FORBIDDEN` for anonymous requests.
pub(crate) fn require_caller<'ctx>(
    context: &async_graphql::Context<'ctx>,
) -> async_graphql::Result<&'ctx Caller> {
    get_caller(context).ok_or_else(|| CatalogError::Forbidden.extend())
}

pub(crate) fn require_admin<'ctx>(
    context: &async_graphql::Context<'ctx>,
) -> async_graphql::Result<&'ctx Caller> {
    let caller = require_caller(context)?;
    if caller.is_admin() {
        Ok(caller)
    } else {
        Err(CatalogError::Forbidden.extend())
    }
}

#[rocket::post("/graphql", data = "<request>", format = "application/json")]
async fn graphql_request(
    schema: &State<ApiSchema>,
    caller: RequestCaller,
    request: GraphQLRequest,
) -> GraphQLResponse {
    request.data(caller).execute(schema.inner()).await
}

#[rocket::get("/graphiql")]
fn graphiql() -> RawHtml<String> {
    RawHtml(GraphiQLSource::build().endpoint("/graphql").finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::Config;
    use crate::models::context::Context;
    use async_graphql::Request;
    use chrono::Utc;
    use movie_cache::{
        CacheManager, LifecycleConfig, MemoryStore, MovieCatalog, MovieRecord, RecordStore, Role,
    };
    use movie_info::{MovieDetail, MovieInfoClient};
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> ApiSchema {
        schema_with(Arc::new(MemoryStore::new()))
    }

    /// Schema over `store` with a provider nobody listens on.
    fn schema_with(store: Arc<MemoryStore>) -> ApiSchema {
        let provider = MovieInfoClient::with_base_url("test", "http://127.0.0.1:9/").unwrap();
        let catalog = MovieCatalog::new(store, Arc::new(provider));
        let cache_manager = CacheManager::new(catalog.clone(), LifecycleConfig::default()).unwrap();
        build_schema(Arc::new(Context::new(catalog, cache_manager, Config::default())))
    }

    fn as_user(query: &str, subject: &str, role: Role) -> Request {
        Request::new(query).data(RequestCaller(Some(Caller::new(subject, role))))
    }

    #[tokio::test]
    async fn test_browse_empty_cache() {
        let response = schema()
            .execute(
                Request::new("{ search { totalCount source pagination { page limit } } }")
                    .data(RequestCaller(None)),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({
                "search": {
                    "totalCount": 0,
                    "source": "CACHE",
                    "pagination": { "page": 1, "limit": 20 }
                }
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_id_carries_code() {
        let response = schema()
            .execute(Request::new(r#"{ movie(id: "123") { source } }"#).data(RequestCaller(None)))
            .await;
        let error = &response.errors[0];
        let code = error.extensions.as_ref().and_then(|e| e.get("code")).cloned();
        assert_eq!(code, Some(async_graphql::Value::from("INVALID_ID")));
    }

    #[tokio::test]
    async fn test_admin_queries_are_gated() {
        let schema = schema();
        let response = schema
            .execute(as_user("{ cacheStats { total } }", "user-1", Role::User))
            .await;
        let code = response.errors[0].extensions.as_ref().and_then(|e| e.get("code")).cloned();
        assert_eq!(code, Some(async_graphql::Value::from("FORBIDDEN")));

        let response = schema
            .execute(as_user("{ cacheHealth { status } }", "admin-1", Role::Admin))
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({ "cacheHealth": { "status": "WARNING" } })
        );
    }

    #[tokio::test]
    async fn test_favorites_round_trip() {
        let schema = schema();
        let response = schema
            .execute(as_user(r#"mutation { addFavorite(id: "tt0468569") }"#, "user-1", Role::User))
            .await;
        assert_eq!(response.data.into_json().unwrap(), json!({ "addFavorite": ["tt0468569"] }));

        let response = schema
            .execute(as_user(r#"mutation { addFavorite(id: "tt0468569") }"#, "user-1", Role::User))
            .await;
        let code = response.errors[0].extensions.as_ref().and_then(|e| e.get("code")).cloned();
        assert_eq!(code, Some(async_graphql::Value::from("FAVORITES")));

        let response = schema
            .execute(as_user(r#"{ isFavorite(id: "tt0468569") }"#, "user-2", Role::User))
            .await;
        assert_eq!(response.data.into_json().unwrap(), json!({ "isFavorite": false }));

        let response = schema
            .execute(Request::new(r#"{ isFavorite(id: "tt0468569") }"#).data(RequestCaller(None)))
            .await;
        assert!(!response.errors.is_empty());
    }

    async fn seed(store: &MemoryStore, id: &str, terms: &[&str]) {
        let mut record = MovieRecord::from_detail(MovieDetail::new(id, "Seeded"), Utc::now());
        for term in terms {
            record.add_search_term(term);
        }
        store.put(record).await.unwrap();
    }

    #[tokio::test]
    async fn test_popular_search_terms() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "tt0468569", &["batman", "dark knight"]).await;
        seed(&store, "tt0372784", &["batman"]).await;

        let response = schema_with(store)
            .execute(
                Request::new("{ popularSearchTerms(limit: 1) { term count } }")
                    .data(RequestCaller(None)),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({ "popularSearchTerms": [{ "term": "batman", "count": 2 }] })
        );
    }

    #[tokio::test]
    async fn test_preload_is_admin_only() {
        let schema = schema();
        let mutation = r#"mutation { preloadCache(terms: ["batman"]) }"#;

        let response = schema.execute(as_user(mutation, "user-1", Role::User)).await;
        let code = response.errors[0].extensions.as_ref().and_then(|e| e.get("code")).cloned();
        assert_eq!(code, Some(async_graphql::Value::from("FORBIDDEN")));

        // Provider is unreachable, so nothing loads but the mutation succeeds.
        let response = schema.execute(as_user(mutation, "admin-1", Role::Admin)).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(response.data.into_json().unwrap(), json!({ "preloadCache": 0 }));
    }

    #[tokio::test]
    async fn test_add_favorite_warms_cache() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "tt0468569", &[]).await;

        let response = schema_with(store.clone())
            .execute(as_user(r#"mutation { addFavorite(id: "tt0468569") }"#, "user-1", Role::User))
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);

        let record = store.get("tt0468569").await.unwrap().unwrap();
        assert_eq!(record.total_search_count, 2);
    }
}
