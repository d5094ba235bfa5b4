use super::super::{get_context, require_caller};
use async_graphql::{Context, ErrorExtensions, Object, Result};
use movie_cache::MovieRecord;

#[derive(Default)]
pub struct FavoritesQuery;

#[Object]
impl FavoritesQuery {
    /// The caller's favorites resolved to movie records. Unresolvable ids are left out.
    async fn favorites<'ctx>(&self, context: &Context<'ctx>) -> Result<Vec<MovieRecord>> {
        let caller = require_caller(context)?;
        let ctx = get_context(context);
        let list = ctx.favorites().list(caller);
        ctx.catalog()
            .resolve_favorites(&list)
            .await
            .map_err(|e| e.extend())
    }

    async fn is_favorite<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<bool> {
        let caller = require_caller(context)?;
        Ok(get_context(context).favorites().contains(caller, &id))
    }
}
