//! Layout and style selection.

use tracing::debug;

use crate::error::SceneError;
use crate::prng::Pcg32;
use crate::types::{KitchenLayout, SceneParams};

/// Every layout.
pub const ALL_LAYOUTS: i64 = -1;
/// Layouts without an island or wall stack.
pub const NO_ISLAND_NO_WALL: i64 = -2;
/// Layouts with an island or wall stack.
pub const ISLAND_OR_WALL: i64 = -3;
/// Layouts with a dining area.
pub const DINING: i64 = -4;
/// Every available style.
pub const ALL_STYLES: i64 = -1;

/// The (layout, style) pairs an episode may draw from.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutSelection {
    /// Explicit pairs; one draw picks a pair.
    Pairs(Vec<(u32, u32)>),
    /// Independent lists; one draw for the layout then one for the style.
    Product { layouts: Vec<u32>, styles: Vec<u32> },
}

fn unpack_layout_code(code: i64, layouts: &[KitchenLayout]) -> Result<Vec<u32>, SceneError> {
    let pick = |keep: fn(&KitchenLayout) -> bool| -> Vec<u32> {
        layouts.iter().filter(|l| keep(l)).map(|l| l.id).collect()
    };
    Ok(match code {
        ALL_LAYOUTS => pick(|_| true),
        NO_ISLAND_NO_WALL => pick(|l| !l.tags.island && !l.tags.wall_stack),
        ISLAND_OR_WALL => pick(|l| l.tags.island || l.tags.wall_stack),
        DINING => pick(|l| l.tags.dining),
        id if id >= 0 => vec![id as u32],
        other => {
            return Err(SceneError::InvalidConfig(format!("unknown layout code {other}")));
        }
    })
}

fn unpack_style_code(code: i64, available: &[u32]) -> Result<Vec<u32>, SceneError> {
    match code {
        ALL_STYLES => Ok(available.to_vec()),
        id if id >= 0 => Ok(vec![id as u32]),
        other => Err(SceneError::InvalidConfig(format!("unknown style code {other}"))),
    }
}

fn unpack_codes(
    codes: Option<&[i64]>,
    unpack: impl Fn(i64) -> Result<Vec<u32>, SceneError>,
    default: i64,
) -> Result<Vec<u32>, SceneError> {
    let codes = codes.unwrap_or(std::slice::from_ref(&default));
    let mut ids = Vec::new();
    for &code in codes {
        for id in unpack(code)? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    Ok(ids)
}

impl LayoutSelection {
    /// Candidates from the params, minus `excluded` layouts.
    pub fn from_params(params: &SceneParams, excluded: &[u32]) -> Result<Self, SceneError> {
        let excluded: Vec<u32> = params.exclude_layouts.iter().chain(excluded).copied().collect();

        let selection = match &params.layout_and_style_ids {
            Some(pairs) => {
                if params.layout_ids.is_some() || params.style_ids.is_some() {
                    return Err(SceneError::InvalidConfig(
                        "layout_and_style_ids cannot be combined with layout_ids or style_ids"
                            .to_string(),
                    ));
                }
                let pairs: Vec<(u32, u32)> = pairs
                    .iter()
                    .filter(|(layout, _)| !excluded.contains(layout))
                    .copied()
                    .collect();
                if pairs.is_empty() {
                    return Err(SceneError::InvalidConfig(
                        "no layout/style pair left after exclusions".to_string(),
                    ));
                }
                LayoutSelection::Pairs(pairs)
            }
            None => {
                let mut layouts = unpack_codes(
                    params.layout_ids.as_deref(),
                    |c| unpack_layout_code(c, &params.layouts),
                    ALL_LAYOUTS,
                )?;
                layouts.retain(|id| !excluded.contains(id));
                let styles = unpack_codes(
                    params.style_ids.as_deref(),
                    |c| unpack_style_code(c, &params.available_style_ids),
                    ALL_STYLES,
                )?;
                if layouts.is_empty() || styles.is_empty() {
                    return Err(SceneError::InvalidConfig(
                        "no layout or style left after exclusions".to_string(),
                    ));
                }
                LayoutSelection::Product { layouts, styles }
            }
        };
        debug!(?selection, "layout candidates");
        Ok(selection)
    }

    pub fn choose(&self, rng: &mut Pcg32) -> Result<(u32, u32), SceneError> {
        let empty = || SceneError::InvalidConfig("empty layout selection".to_string());
        match self {
            LayoutSelection::Pairs(pairs) => rng.choose(pairs).copied().ok_or_else(empty),
            LayoutSelection::Product { layouts, styles } => {
                let layout = *rng.choose(layouts).ok_or_else(empty)?;
                let style = *rng.choose(styles).ok_or_else(empty)?;
                Ok((layout, style))
            }
        }
    }
}
