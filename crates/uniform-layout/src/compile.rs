//! First-fit-decreasing packing of uniform declarations into RGBA texels.
//!
//! Declarations are sorted by slot count (largest first, declaration order on
//! ties) and then placed one by one into 4-slot bins:
//!
//! - types smaller than a texel take the first opened bin with enough room,
//!   otherwise they open a new bin;
//! - texel-sized and larger types always open fresh bins so that a shader can
//!   rebuild them from whole texels. Slack left in their last bin stays
//!   available to later small types.
//!
//! The bin fill counters live only for the duration of [`compile`].
use std::collections::BTreeMap;

use serde::Serialize;

use crate::{ChannelCount, LayoutError, UniformSchema, UniformType, TEXEL_SLOTS};

/// Placement of one uniform inside an instance's row of scalar slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UniformEntry {
    pub offset: usize,
    pub size: usize,
    #[serde(rename = "type")]
    pub ty: UniformType,
}

impl UniformEntry {
    /// Texel holding the first component of this uniform.
    pub fn texel(&self) -> usize {
        self.offset / TEXEL_SLOTS
    }

    /// Channel of [`Self::texel`] holding the first component.
    pub fn channel(&self) -> usize {
        self.offset % TEXEL_SLOTS
    }

    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    pub fn overlaps(&self, other: &UniformEntry) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Compiled name → placement lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UniformMap {
    entries: BTreeMap<String, UniformEntry>,
}

impl UniformMap {
    pub fn get(&self, name: &str) -> Option<&UniformEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Entries sorted by ascending offset.
    pub fn by_offset(&self) -> Vec<(&str, &UniformEntry)> {
        let mut ordered: Vec<_> = self.iter().collect();
        ordered.sort_by_key(|(_, entry)| entry.offset);
        ordered
    }
}

/// Result of compiling a [`UniformSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniformLayout {
    channels: ChannelCount,
    pixels_per_instance: usize,
    texels_spanned: usize,
    total_slots: usize,
    uniforms: UniformMap,
}

impl UniformLayout {
    /// Components stored per texel.
    pub fn channels(&self) -> ChannelCount {
        self.channels
    }

    /// `ceil(total_slots / 4)`.
    pub fn pixels_per_instance(&self) -> usize {
        self.pixels_per_instance
    }

    /// Bins opened while packing. Exceeds [`Self::pixels_per_instance`] when
    /// aligned types leave slack no later declaration could fill.
    pub fn texels_spanned(&self) -> usize {
        self.texels_spanned
    }

    /// Texels reserved per instance in backing storage, covering every placed
    /// uniform.
    pub fn row_texels(&self) -> usize {
        self.pixels_per_instance.max(self.texels_spanned)
    }

    pub fn total_slots(&self) -> usize {
        self.total_slots
    }

    pub fn uniforms(&self) -> &UniformMap {
        &self.uniforms
    }

    pub fn entry(&self, name: &str) -> Option<&UniformEntry> {
        self.uniforms.get(name)
    }

    /// Scalar slots a shader reads per instance: `pixels_per_instance`
    /// texels of `channels` components each.
    pub fn slots_per_instance(&self) -> usize {
        self.pixels_per_instance * self.channels.get()
    }

    /// Uniforms in offset order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UniformEntry)> + '_ {
        self.uniforms.by_offset().into_iter()
    }
}

/// Packs `schema` into texels and records every uniform's placement.
pub fn compile(schema: &UniformSchema) -> Result<UniformLayout, LayoutError> {
    if schema.is_empty() {
        return Err(LayoutError::EmptySchema);
    }

    let mut ordered: Vec<_> = schema.iter().collect();
    // Stable, so equal sizes keep declaration order.
    ordered.sort_by(|a, b| b.ty.size().cmp(&a.ty.size()));

    let mut bins: Vec<usize> = Vec::new();
    let mut uniforms = UniformMap::default();
    for decl in ordered {
        let size = decl.ty.size();
        let offset = place(&mut bins, size);
        tracing::trace!(name = %decl.name, ty = %decl.ty, offset, size, "placed uniform");
        uniforms.entries.insert(
            decl.name.clone(),
            UniformEntry {
                offset,
                size,
                ty: decl.ty,
            },
        );
    }

    let total_slots = schema.total_slots();
    let pixels_per_instance = total_slots.div_ceil(TEXEL_SLOTS);
    let channels = ChannelCount::new(total_slots.min(TEXEL_SLOTS)).unwrap_or(ChannelCount::RGBA);

    if bins.len() > pixels_per_instance {
        tracing::debug!(
            pixels_per_instance,
            texels_spanned = bins.len(),
            "packing slack exceeds one texel; storage rows reserve the spanned texels"
        );
    }
    tracing::debug!(
        uniforms = uniforms.len(),
        total_slots,
        pixels_per_instance,
        channels = channels.get(),
        "compiled uniform layout"
    );

    Ok(UniformLayout {
        channels,
        pixels_per_instance,
        texels_spanned: bins.len(),
        total_slots,
        uniforms,
    })
}

/// Returns the slot offset for an item of `size` slots, updating bin fills.
fn place(bins: &mut Vec<usize>, size: usize) -> usize {
    if size < TEXEL_SLOTS {
        if let Some((index, used)) = bins
            .iter_mut()
            .enumerate()
            .find(|(_, used)| **used + size <= TEXEL_SLOTS)
        {
            let offset = index * TEXEL_SLOTS + *used;
            *used += size;
            return offset;
        }
    }

    let offset = bins.len() * TEXEL_SLOTS;
    let mut remaining = size;
    while remaining > 0 {
        let taken = remaining.min(TEXEL_SLOTS);
        bins.push(taken);
        remaining -= taken;
    }
    offset
}

impl UniformSchema {
    pub fn compile(&self) -> Result<UniformLayout, LayoutError> {
        compile(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(pairs: &[(&str, UniformType)]) -> UniformSchema {
        pairs.iter().map(|(name, ty)| (*name, *ty)).collect()
    }

    fn offset(layout: &UniformLayout, name: &str) -> usize {
        layout.entry(name).expect("entry").offset
    }

    #[test]
    fn vec3_float_vec2_backfills_first_texel() {
        let layout = compile(&schema(&[
            ("a", UniformType::Vec3),
            ("b", UniformType::Float),
            ("c", UniformType::Vec2),
        ]))
        .unwrap();

        assert_eq!(offset(&layout, "a"), 0);
        assert_eq!(offset(&layout, "c"), 4);
        assert_eq!(offset(&layout, "b"), 3);
        assert_eq!(layout.pixels_per_instance(), 2);
        assert_eq!(layout.channels().get(), 4);
    }

    #[test]
    fn single_mat4_fills_four_texels() {
        let layout = compile(&schema(&[("m", UniformType::Mat4)])).unwrap();
        assert_eq!(offset(&layout, "m"), 0);
        assert_eq!(layout.pixels_per_instance(), 4);
        assert_eq!(layout.channels().get(), 4);
    }

    #[test]
    fn single_float_narrows_channels() {
        let layout = compile(&schema(&[("x", UniformType::Float)])).unwrap();
        assert_eq!(offset(&layout, "x"), 0);
        assert_eq!(layout.pixels_per_instance(), 1);
        assert_eq!(layout.channels().get(), 1);
    }

    #[test]
    fn vec2_then_float_share_a_texel() {
        let layout = compile(&schema(&[
            ("v", UniformType::Vec2),
            ("f", UniformType::Float),
        ]))
        .unwrap();
        assert_eq!(offset(&layout, "v"), 0);
        assert_eq!(offset(&layout, "f"), 2);
        assert_eq!(layout.channels().get(), 3);
    }

    #[test]
    fn two_vec3_open_separate_texels() {
        let layout = compile(&schema(&[
            ("p", UniformType::Vec3),
            ("q", UniformType::Vec3),
        ]))
        .unwrap();
        assert_eq!(offset(&layout, "p"), 0);
        assert_eq!(offset(&layout, "q"), 4);
        assert_eq!(layout.pixels_per_instance(), 2);
    }

    #[test]
    fn large_types_never_reuse_partial_bins() {
        let layout = compile(&schema(&[
            ("f", UniformType::Float),
            ("v4", UniformType::Vec4),
            ("m3", UniformType::Mat3),
        ]))
        .unwrap();
        // mat3 spans bins 0..3 leaving three slots in bin 2.
        assert_eq!(offset(&layout, "m3"), 0);
        assert_eq!(offset(&layout, "v4"), 12);
        assert_eq!(offset(&layout, "f"), 9);
        assert_eq!(layout.pixels_per_instance(), 4);
        assert_eq!(layout.texels_spanned(), 4);
    }

    #[test]
    fn ties_keep_declaration_order() {
        let layout = compile(&schema(&[
            ("second", UniformType::Vec2),
            ("first", UniformType::Vec2),
        ]))
        .unwrap();
        assert_eq!(offset(&layout, "second"), 0);
        assert_eq!(offset(&layout, "first"), 2);
    }

    #[test]
    fn iterates_by_offset_and_counts_slots() {
        let layout = compile(&schema(&[
            ("c", UniformType::Vec2),
            ("a", UniformType::Vec3),
            ("b", UniformType::Float),
        ]))
        .unwrap();
        let order: Vec<(&str, usize)> = layout
            .iter()
            .map(|(name, entry)| (name, entry.offset))
            .collect();
        assert_eq!(order, vec![("a", 0), ("b", 3), ("c", 4)]);
        assert_eq!(layout.slots_per_instance(), 8);

        let narrow = compile(&schema(&[
            ("v", UniformType::Vec2),
            ("f", UniformType::Float),
        ]))
        .unwrap();
        assert_eq!(narrow.slots_per_instance(), 3);
    }

    #[test]
    fn empty_schema_is_rejected() {
        assert!(matches!(
            compile(&UniformSchema::new()),
            Err(LayoutError::EmptySchema)
        ));
    }

    #[test]
    fn unfillable_slack_widens_storage_rows() {
        let layout = compile(&schema(&[
            ("a", UniformType::Vec3),
            ("b", UniformType::Vec3),
            ("c", UniformType::Vec2),
        ]))
        .unwrap();
        assert_eq!(layout.pixels_per_instance(), 2);
        assert_eq!(layout.texels_spanned(), 3);
        assert_eq!(layout.row_texels(), 3);
        assert_eq!(offset(&layout, "c"), 8);
    }

    #[test]
    fn layout_properties_hold_for_many_schemas() {
        // Every sequence of one to four declarations over the type table.
        let mut cases: Vec<Vec<UniformType>> =
            UniformType::ALL.iter().map(|ty| vec![*ty]).collect();
        let mut frontier = cases.clone();
        for _ in 1..4 {
            frontier = frontier
                .iter()
                .flat_map(|case| {
                    UniformType::ALL.iter().map(move |ty| {
                        let mut extended = case.clone();
                        extended.push(*ty);
                        extended
                    })
                })
                .collect();
            cases.extend(frontier.iter().cloned());
        }

        for case in &cases {
            let schema: UniformSchema = case
                .iter()
                .enumerate()
                .map(|(index, ty)| (format!("u{index}"), *ty))
                .collect();
            let layout = compile(&schema).unwrap();
            let total: usize = case.iter().map(|ty| ty.size()).sum();

            assert_eq!(layout.pixels_per_instance(), total.div_ceil(4));
            assert_eq!(layout.channels().get(), total.min(4));
            let furthest = layout.uniforms().iter().map(|(_, e)| e.end()).max().unwrap();
            assert!(layout.row_texels() * 4 >= furthest, "{case:?}");

            let entries: Vec<_> = layout.uniforms().iter().collect();
            for (index, (_, entry)) in entries.iter().enumerate() {
                if entry.ty.is_texel_aligned() {
                    assert_eq!(entry.offset % 4, 0, "{case:?}");
                } else {
                    assert_eq!(entry.texel(), (entry.end() - 1) / 4, "{case:?}");
                }
                for (_, other) in &entries[index + 1..] {
                    assert!(!entry.overlaps(other), "{case:?}");
                }
            }
        }
    }
}
