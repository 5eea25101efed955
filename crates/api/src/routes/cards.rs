use std::str::FromStr;

use anyhow::anyhow;
use axum::{
    extract::{Query, State},
    routing::get, Router,
};
use serde::{Deserialize, Serialize};

use academy_runtime::{CardType, GalleryQuery, GallerySort, Rarity};

use crate::{response::{AppError, AppSuccess}, GlobalState};

pub fn card_routes() -> Router<GlobalState> {
    Router::new()
        .route("/cards",
            get(browse_cards)
        )
}

/// Query string form of [`GalleryQuery`]; lists are comma separated.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardsParams {
    pub name: Option<String>,
    pub rarity: Option<String>,
    pub types: Option<String>,
    pub pool: Option<String>,
    pub min_kn: Option<u32>,
    pub max_kn: Option<u32>,
    pub subjects: Option<String>,
    pub sort: Option<String>,
    pub page: Option<usize>,
}

fn split_list(raw: &Option<String>) -> Option<Vec<&str>> {
    let items = raw
        .as_deref()?
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>();
    (!items.is_empty()).then_some(items)
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

impl TryFrom<CardsParams> for GalleryQuery {
    type Error = AppError;

    fn try_from(params: CardsParams) -> Result<Self, Self::Error> {
        let rarity = non_empty(&params.rarity)
            .map(|value| Rarity::from_str(value).map_err(|_| anyhow!("unknown rarity `{value}`")))
            .transpose()?;

        let types = split_list(&params.types)
            .map(|items| {
                items
                    .into_iter()
                    .map(|value| CardType::from_str(value).map_err(|_| anyhow!("unknown card type `{value}`")))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let sort = non_empty(&params.sort)
            .map(|value| GallerySort::from_str(value).map_err(|_| anyhow!("unknown sort `{value}`")))
            .transpose()?
            .unwrap_or_default();

        Ok(GalleryQuery {
            name: non_empty(&params.name).map(str::to_string),
            rarity,
            types,
            pool: non_empty(&params.pool).map(str::to_string),
            min_kn: params.min_kn,
            max_kn: params.max_kn,
            subjects: split_list(&params.subjects)
                .map(|items| items.into_iter().map(str::to_string).collect()),
            sort,
            page: params.page.unwrap_or(1),
        })
    }
}

async fn browse_cards(
    State(state): State<GlobalState>,
    Query(params): Query<CardsParams>,
) -> Result<AppSuccess, AppError> {
    let query = GalleryQuery::try_from(params)?;
    let page = query.run(state.draw_service.catalog());
    AppSuccess::ok("Cards", page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_filters() {
        let params = CardsParams {
            rarity: Some("傳說".into()),
            types: Some("學生卡, 武器卡,".into()),
            subjects: Some("數學,歷史".into()),
            sort: Some("kn_desc".into()),
            ..Default::default()
        };
        let query = GalleryQuery::try_from(params).unwrap();
        assert_eq!(query.rarity, Some(Rarity::Legendary));
        assert_eq!(query.types, Some(vec![CardType::Student, CardType::Weapon]));
        assert_eq!(query.subjects, Some(vec!["數學".to_string(), "歷史".to_string()]));
        assert_eq!(query.sort, GallerySort::KnDesc);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn blank_params_do_not_filter() {
        let params = CardsParams {
            name: Some("  ".into()),
            types: Some(",".into()),
            ..Default::default()
        };
        let query = GalleryQuery::try_from(params).unwrap();
        assert!(query.name.is_none());
        assert!(query.types.is_none());
    }

    #[test]
    fn unknown_rarity_is_rejected() {
        let params = CardsParams { rarity: Some("神話".into()), ..Default::default() };
        assert!(GalleryQuery::try_from(params).is_err());
    }
}
