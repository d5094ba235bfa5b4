use super::super::{get_context, require_caller};
use async_graphql::{Context, ErrorExtensions, Object, Result};
use log::debug;
use movie_cache::CatalogError;

#[derive(Default)]
pub struct FavoritesMutation;

#[Object]
impl FavoritesMutation {
    /// Add a movie to the caller's favorites. Returns the updated list of ids.
    async fn add_favorite<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<Vec<String>> {
        let caller = require_caller(context)?;
        let ctx = get_context(context);
        let list = ctx
            .favorites()
            .add(caller, &id)
            .map_err(|e| CatalogError::from(e).extend())?;

        // Warm the cache; the favorite stands even when this fails.
        if let Err(e) = ctx.catalog().get_detail_with_cache(&id).await {
            debug!("Could not cache favorite {}: {}", id, e);
        }
        Ok(list.ids().to_vec())
    }

    async fn remove_favorite<'ctx>(
        &self,
        context: &Context<'ctx>,
        id: String,
    ) -> Result<Vec<String>> {
        let caller = require_caller(context)?;
        let list = get_context(context)
            .favorites()
            .remove(caller, &id)
            .map_err(|e| CatalogError::from(e).extend())?;
        Ok(list.ids().to_vec())
    }
}
