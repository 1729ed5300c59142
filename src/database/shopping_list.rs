use std::collections::BTreeMap;

use serde::Serialize;

use super::schema::CartPart;
use crate::constants::SHOPPING_LIST_HEADER;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShoppingListEntry {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Cart line items summed per (ingredient name, unit), ordered by name ignoring case.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShoppingList {
    pub entries: Vec<ShoppingListEntry>,
}

impl ShoppingList {
    pub fn from_parts(parts: impl IntoIterator<Item = CartPart>) -> Self {
        let mut totals: BTreeMap<(String, String, String), i64> = BTreeMap::new();
        parts.into_iter().for_each(|part| {
            *totals
                .entry((part.name.to_lowercase(), part.name, part.measurement_unit))
                .or_insert(0) += i64::from(part.amount);
        });

        Self {
            entries: totals
                .into_iter()
                .map(|((_, name, measurement_unit), amount)| ShoppingListEntry {
                    name,
                    measurement_unit,
                    amount,
                })
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut report = format!("{SHOPPING_LIST_HEADER}\n");
        self.entries.iter().for_each(|entry| {
            report += &format!(
                "\n{} - {}, {}",
                entry.name, entry.amount, entry.measurement_unit
            );
        });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, unit: &str, amount: i32) -> CartPart {
        CartPart {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn sums_same_ingredient_across_recipes() {
        let list = ShoppingList::from_parts(vec![part("flour", "g", 200), part("flour", "g", 300)]);
        assert_eq!(
            list.entries,
            vec![ShoppingListEntry {
                name: "flour".into(),
                measurement_unit: "g".into(),
                amount: 500
            }]
        );
        assert_eq!(list.render(), "Shopping list:\n\nflour - 500, g");
    }

    #[test]
    fn orders_groups_by_name() {
        let list = ShoppingList::from_parts(vec![
            part("sugar", "g", 50),
            part("eggs", "pcs", 2),
            part("milk", "ml", 250),
            part("eggs", "pcs", 1),
        ]);
        let names: Vec<&str> = list.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["eggs", "milk", "sugar"]);
        assert_eq!(
            list.render(),
            "Shopping list:\n\neggs - 3, pcs\nmilk - 250, ml\nsugar - 50, g"
        );
    }

    #[test]
    fn ordering_ignores_case() {
        let list = ShoppingList::from_parts(vec![
            part("Banana", "pcs", 2),
            part("apple", "pcs", 1),
            part("Cherry", "g", 100),
        ]);
        let names: Vec<&str> = list.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["apple", "Banana", "Cherry"]);
    }

    #[test]
    fn keeps_units_apart() {
        let list = ShoppingList::from_parts(vec![part("salt", "g", 5), part("salt", "pinch", 1)]);
        assert_eq!(list.entries.len(), 2);
    }

    #[test]
    fn empty_cart_renders_header_only() {
        let list = ShoppingList::from_parts(vec![]);
        assert!(list.entries.is_empty());
        assert_eq!(list.render(), "Shopping list:\n");
    }
}
