// src/geometry/point_groups.rs
//! Buckets items by colour so each colour becomes one batched primitive.

use std::collections::HashMap;

use crate::colour::Colour;

#[derive(Clone, Debug, PartialEq)]
pub struct ColourGroup<T> {
    pub colour: Colour,
    pub items: Vec<T>,
    /// Positions of the members in the input slice.
    pub indices: Vec<usize>,
}

impl<T> ColourGroup<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Partition `items` by the colour at the same index. Groups appear in order of
/// first occurrence. `colours` must be as long as `items`.
pub fn group_by_colour<T: Clone>(items: &[T], colours: &[Colour]) -> Vec<ColourGroup<T>> {
    debug_assert_eq!(items.len(), colours.len());
    let mut slot: HashMap<&Colour, usize> = HashMap::new();
    let mut groups: Vec<ColourGroup<T>> = Vec::new();
    for (i, (item, colour)) in items.iter().zip(colours).enumerate() {
        let g = *slot.entry(colour).or_insert_with(|| {
            groups.push(ColourGroup {
                colour: colour.clone(),
                items: Vec::new(),
                indices: Vec::new(),
            });
            groups.len() - 1
        });
        groups[g].items.push(item.clone());
        groups[g].indices.push(i);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(hex: &str) -> Colour {
        Colour::parse(hex).unwrap()
    }

    #[test]
    fn three_points_two_colours() {
        let points = [[0.0f32; 3], [1.0; 3], [2.0; 3]];
        let colours = [c("#ff0000"), c("#00ff00"), c("#ff0000")];
        let groups = group_by_colour(&points, &colours);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].colour, c("#ff0000"));
        assert_eq!(groups[0].indices, vec![0, 2]);
        assert_eq!(groups[1].items, vec![[1.0; 3]]);
    }

    #[test]
    fn sizes_sum_to_input_and_groups_match_distinct_colours() {
        let palette = ["#111111", "#222222", "#333333", "#444444"];
        let n = 37;
        let items: Vec<usize> = (0..n).collect();
        let colours: Vec<Colour> = (0..n).map(|i| c(palette[(i * 7 + i / 3) % 3])).collect();
        let groups = group_by_colour(&items, &colours);
        let mut distinct = colours.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(groups.len(), distinct.len());
        assert_eq!(groups.iter().map(ColourGroup::len).sum::<usize>(), n);
    }

    #[test]
    fn empty_input_has_no_groups() {
        let groups = group_by_colour::<u8>(&[], &[]);
        assert!(groups.is_empty());
    }
}
