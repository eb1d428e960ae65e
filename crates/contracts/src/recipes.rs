//! Static recipe list. Process-wide immutable data; looked up by product.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::catalog::ObjectType;

/// One input line of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeItem {
    pub item: ObjectType,
    pub quantity: u32,
}

/// A crafting conversion: `items` consumed, `amount` of `product` produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub product: ObjectType,
    pub amount: u32,
    pub items: Vec<RecipeItem>,
    pub by_hand: bool,
}

fn recipe(product: ObjectType, amount: u32, items: &[(ObjectType, u32)], by_hand: bool) -> Recipe {
    Recipe {
        product,
        amount,
        items: items
            .iter()
            .map(|&(item, quantity)| RecipeItem { item, quantity })
            .collect(),
        by_hand,
    }
}

/// All recipes, in stable order.
pub fn recipes() -> &'static [Recipe] {
    static RECIPES: OnceLock<Vec<Recipe>> = OnceLock::new();
    RECIPES.get_or_init(|| {
        use ObjectType as T;
        vec![
            recipe(T::WattleWall, 1, &[(T::Stick, 10)], true),
            recipe(T::Plank, 1, &[(T::Wood, 1)], false),
            recipe(T::Brick, 2, &[(T::Clay, 1), (T::Coal, 1)], false),
            recipe(T::Thatch, 1, &[(T::Reed, 10)], true),
            recipe(T::Bread, 1, &[(T::Wheat, 1)], false),
            recipe(T::FishingRod, 1, &[(T::Stick, 5), (T::Reed, 2)], true),
        ]
    })
}

/// The recipe producing `product`, if any.
pub fn recipe_for(product: ObjectType) -> Option<&'static Recipe> {
    recipes().iter().find(|r| r.product == product)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wattle_wall_is_ten_sticks_by_hand() {
        let recipe = recipe_for(ObjectType::WattleWall).expect("wattle wall recipe");
        assert_eq!(recipe.amount, 1);
        assert!(recipe.by_hand);
        assert_eq!(
            recipe.items,
            vec![RecipeItem {
                item: ObjectType::Stick,
                quantity: 10
            }]
        );
    }

    #[test]
    fn products_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for recipe in recipes() {
            assert!(seen.insert(recipe.product), "duplicate {:?}", recipe.product);
        }
    }
}
