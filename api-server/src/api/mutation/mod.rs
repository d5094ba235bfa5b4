mod cache;
mod favorites;

use async_graphql::MergedObject;
use cache::CacheMutation;
use favorites::FavoritesMutation;

#[derive(MergedObject, Default)]
pub struct Mutation(CacheMutation, FavoritesMutation);
