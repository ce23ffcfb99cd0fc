use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use crate::schema::RecipePart;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl Display for ShoppingListLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} {}", self.name, self.amount, self.measurement_unit)
    }
}

/// Ingredients of every recipe in a cart, summed per (name, unit) and
/// ordered by name then unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingList {
    lines: Vec<ShoppingListLine>,
}

impl ShoppingList {
    pub fn from_parts(parts: impl IntoIterator<Item = RecipePart>) -> Self {
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for part in parts {
            *totals
                .entry((part.name, part.measurement_unit))
                .or_insert(0) += i64::from(part.amount);
        }

        Self {
            lines: totals
                .into_iter()
                .map(|((name, measurement_unit), amount)| ShoppingListLine {
                    name,
                    measurement_unit,
                    amount,
                })
                .collect(),
        }
    }

    pub fn lines(&self) -> &[ShoppingListLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|line| format!("{line}\n"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn part(recipe_id: i32, ingredient_id: i32, name: &str, unit: &str, amount: i16) -> RecipePart {
        RecipePart {
            recipe_id,
            ingredient_id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn sums_the_same_ingredient_across_recipes() {
        let list = ShoppingList::from_parts(vec![
            part(1, 10, "flour", "g", 200),
            part(1, 11, "egg", "pcs", 2),
            part(2, 10, "flour", "g", 100),
        ]);

        assert_eq!(list.lines().len(), 2);
        assert_eq!(list.render(), "egg - 2 pcs\nflour - 300 g\n");
    }

    #[test]
    fn units_are_part_of_the_key() {
        let list = ShoppingList::from_parts(vec![
            part(1, 10, "sugar", "g", 50),
            part(2, 12, "sugar", "tbsp", 2),
        ]);
        assert_eq!(list.render(), "sugar - 50 g\nsugar - 2 tbsp\n");
    }

    #[test]
    fn sums_past_the_column_range() {
        let list = ShoppingList::from_parts(vec![
            part(1, 10, "water", "ml", i16::MAX),
            part(2, 10, "water", "ml", i16::MAX),
        ]);
        assert_eq!(list.lines()[0].amount, 2 * i64::from(i16::MAX));
    }

    #[test]
    fn empty_cart_renders_an_empty_document() {
        let list = ShoppingList::from_parts(vec![]);
        assert!(list.is_empty());
        assert_eq!(list.render(), "");
    }

    proptest! {
        #[test]
        fn order_of_rows_does_not_matter(
            rows in proptest::collection::vec((0..4usize, 1..500i16), 0..20)
        ) {
            let names = ["apple", "butter", "cream", "dill"];
            let parts: Vec<_> = rows
                .iter()
                .enumerate()
                .map(|(i, (n, amount))| part(i as i32, *n as i32, names[*n], "g", *amount))
                .collect();

            let mut reversed = parts.clone();
            reversed.reverse();

            let forward = ShoppingList::from_parts(parts);
            let backward = ShoppingList::from_parts(reversed);
            prop_assert_eq!(&forward, &backward);

            let total: i64 = rows.iter().map(|(_, a)| i64::from(*a)).sum();
            prop_assert_eq!(forward.lines().iter().map(|l| l.amount).sum::<i64>(), total);
        }
    }
}
