//! Visual styles offered on the form, and the guide text that sharpens some of them.

use std::str::FromStr;

/// A group of styles shown together in the picker.
#[derive(Clone, Copy, Debug)]
pub struct StyleCategory {
    /// Heading shown above the group.
    pub name: &'static str,
    /// Styles in the group, in display order.
    pub styles: &'static [&'static str],
}

/// Every style the picker offers, grouped.
pub const STYLE_CATEGORIES: &[StyleCategory] = &[
    StyleCategory {
        name: "Animation / comics",
        styles: &[
            "Studio Ghibli - Howl's Moving Castle style",
            "Studio Ghibli - Spirited Away style",
            "Studio Ghibli - My Neighbor Totoro style",
            "Studio Ghibli - Princess Mononoke style",
            "Disney classic animation style",
            "Disney 3D animation style",
            "Pixar 3D animation style",
            "Korean webtoon style (LINE Webtoon)",
            "Japanese manga - shonen style",
            "Japanese manga - shojo style",
            "Marvel Comics style",
            "DC Comics style",
            "The Simpsons style",
            "Powerpuff Girls style",
            "Adventure Time style",
            "Avatar: The Last Airbender style",
        ],
    },
    StyleCategory {
        name: "Fine art",
        styles: &[
            "Watercolor style",
            "Oil painting style",
            "Impressionist style",
            "Pop art style",
            "Minimalist style",
            "Surrealist style",
            "Art Nouveau style",
            "Ink wash painting style",
            "Van Gogh style",
            "Picasso style",
            "Monet style",
            "Andy Warhol style",
        ],
    },
    StyleCategory {
        name: "Games / digital",
        styles: &[
            "Pixel art style",
            "Roblox style",
            "Minecraft style",
            "Fortnite style",
            "Cyberpunk style",
            "Vaporwave style",
            "Low-poly 3D style",
            "Retro game style",
            "Zelda: Tears of the Kingdom style",
        ],
    },
    StyleCategory {
        name: "Other",
        styles: &[
            "Claymation style",
            "Stop-motion style",
            "Vintage poster style",
            "Neon sign style",
            "Sketchbook style",
            "Sticker art style",
            "Collage style",
            "Newspaper comic strip style",
            "Silhouette style",
            "Pastel color style",
        ],
    },
];

/// Guide text appended to the style for the styles that have one.
const STYLE_GUIDES: &[(&str, &str)] = &[
    (
        "Studio Ghibli - Howl's Moving Castle style",
        "pastel tones, detailed backgrounds, soft lines, a world where nature and magic blend",
    ),
    (
        "Studio Ghibli - Spirited Away style",
        "fantastical elements, rich color palette, East Asian aesthetics, intricate backgrounds",
    ),
    (
        "Studio Ghibli - My Neighbor Totoro style",
        "cute character design, countryside nature, warm colors, expressive characters",
    ),
    (
        "Studio Ghibli - Princess Mononoke style",
        "nature and spirit motifs, deep colors, dynamic action scenes, intricate backgrounds",
    ),
    (
        "Disney classic animation style",
        "smooth lines, rounded character design, rich colors, lighting focused on the hero",
    ),
    (
        "Disney 3D animation style",
        "glossy textures, rich colors, cinematic framing, expressive characters, 3D rendering",
    ),
    (
        "Pixar 3D animation style",
        "fine textures, accurate lighting, emotional expression, stylized characters",
    ),
    (
        "Korean webtoon style (LINE Webtoon)",
        "clean line art, flat colors, strong outlines, expressive emotion effects, vertical scroll format",
    ),
    (
        "Japanese manga - shonen style",
        "sharp lines, dynamic action lines, exaggerated expressions, speed lines",
    ),
    (
        "Japanese manga - shojo style",
        "delicate lines, sparkling eyes, floral backgrounds, emotionally rich faces",
    ),
    (
        "Marvel Comics style",
        "muscular characters, strong outlines, vivid colors, dynamic poses, dramatic composition",
    ),
    (
        "DC Comics style",
        "dark tones, strong contrast, city backdrops, heroic poses, realistic proportions",
    ),
];

/// The first style in the list, used when nothing valid was picked.
pub fn default_style() -> &'static str {
    STYLE_CATEGORIES
        .first()
        .and_then(|category| category.styles.first())
        .copied()
        .unwrap_or("Korean webtoon style (LINE Webtoon)")
}

/// Every style in display order.
pub fn all_styles() -> impl Iterator<Item = &'static str> {
    STYLE_CATEGORIES
        .iter()
        .flat_map(|category| category.styles.iter().copied())
}

/// Is this one of the styles in the picker?
pub fn is_known_style(style: &str) -> bool {
    all_styles().any(|known| known == style)
}

/// The style actually used: a non-empty custom style wins over the picked one.
pub fn resolve_style(selected: &str, custom: &str) -> String {
    let custom = custom.trim();
    if !custom.is_empty() {
        return custom.to_string();
    }
    let selected = selected.trim();
    if is_known_style(selected) {
        selected.to_string()
    } else {
        default_style().to_string()
    }
}

/// Guide text for a style, if it has one.
pub fn guide_for(style: &str) -> Option<&'static str> {
    STYLE_GUIDES
        .iter()
        .find(|(name, _)| *name == style)
        .map(|(_, guide)| *guide)
}

/// Notes shown on the style guide page for styles without a prompt guide.
/// These never reach a prompt.
const STYLE_NOTES: &[(&str, &str)] = &[
    (
        "Watercolor style",
        "transparent layers of color, soft edges, colors that bleed into each other, subtle shifts in tone",
    ),
    (
        "Oil painting style",
        "textured brush strokes, rich color, thick paint, strong light and shadow",
    ),
    (
        "Pop art style",
        "bold colors, simplified shapes, pop culture references, repeated patterns, thick outlines",
    ),
    (
        "Minimalist style",
        "simple shapes, a limited palette, lots of empty space, nothing that isn't needed",
    ),
    (
        "Pixel art style",
        "square pixels, a limited palette, an 8-bit or 16-bit game feel, crisp edges",
    ),
    (
        "Roblox style",
        "blocky characters, simple textures, bright colors, low detail",
    ),
    (
        "Minecraft style",
        "voxel shapes, pixelated textures, rectangular block structures",
    ),
    (
        "Cyberpunk style",
        "neon colors, futuristic cities, high tech against low life, a dystopian mood",
    ),
];

/// Reference text for the style guide page: the prompt guide if there is one, otherwise a display-only note.
pub fn reference_note(style: &str) -> Option<&'static str> {
    guide_for(style).or_else(|| {
        STYLE_NOTES
            .iter()
            .find(|(name, _)| *name == style)
            .map(|(_, note)| *note)
    })
}

/// How much of the style guide gets mixed into prompts.
///
/// Any level other than [`StyleGuideLevel::None`] appends the whole guide.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StyleGuideLevel {
    /// Leave the guide out.
    None,
    /// The default.
    #[default]
    Light,
    /// Medium.
    Medium,
    /// Heavy.
    Heavy,
}

impl StyleGuideLevel {
    /// All levels, for the picker.
    pub const ALL: [StyleGuideLevel; 4] = [Self::None, Self::Light, Self::Medium, Self::Heavy];

    /// Form value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
        }
    }

    /// Label shown on the form.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Light => "A little",
            Self::Medium => "Moderate",
            Self::Heavy => "A lot",
        }
    }
}

impl FromStr for StyleGuideLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "light" => Ok(Self::Light),
            "medium" => Ok(Self::Medium),
            "heavy" => Ok(Self::Heavy),
            _ => Err(()),
        }
    }
}

/// The `", <guide>"` suffix for a style, or an empty string.
pub fn guide_suffix(style: &str, level: StyleGuideLevel) -> String {
    if level == StyleGuideLevel::None {
        return String::new();
    }
    guide_for(style)
        .map(|guide| format!(", {guide}"))
        .unwrap_or_default()
}

/// The style with its guide suffix.
pub fn enhanced_style(style: &str, level: StyleGuideLevel) -> String {
    format!("{style}{}", guide_suffix(style, level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_style_wins() {
        assert_eq!(
            resolve_style("Pixel art style", "  crayon drawing  "),
            "crayon drawing"
        );
        assert_eq!(resolve_style("Pixel art style", " "), "Pixel art style");
        assert_eq!(resolve_style("not a style", ""), default_style());
    }

    #[test]
    fn guide_only_for_known_styles_and_levels() {
        let ghibli = "Studio Ghibli - My Neighbor Totoro style";
        assert_eq!(
            enhanced_style(ghibli, StyleGuideLevel::Light),
            format!("{ghibli}, cute character design, countryside nature, warm colors, expressive characters")
        );
        assert_eq!(
            enhanced_style(ghibli, StyleGuideLevel::Heavy),
            enhanced_style(ghibli, StyleGuideLevel::Medium)
        );
        assert_eq!(enhanced_style(ghibli, StyleGuideLevel::None), ghibli);
        assert_eq!(
            enhanced_style("Pixel art style", StyleGuideLevel::Heavy),
            "Pixel art style"
        );
    }

    #[test]
    fn every_guide_names_a_listed_style() {
        for (name, _) in STYLE_GUIDES {
            assert!(is_known_style(name), "{name} is not in the picker");
        }
        assert_eq!(all_styles().count(), 47);
    }

    #[test]
    fn notes_cover_unguided_styles_without_touching_prompts() {
        for (name, _) in STYLE_NOTES {
            assert!(is_known_style(name), "{name} is not in the picker");
            assert!(guide_for(name).is_none(), "{name} already has a guide");
            assert_eq!(enhanced_style(name, StyleGuideLevel::Heavy), *name);
        }
        assert!(reference_note("Minecraft style").is_some_and(|note| note.contains("voxel")));
        assert_eq!(
            reference_note("DC Comics style"),
            guide_for("DC Comics style")
        );
        assert_eq!(reference_note("Collage style"), None);
    }

    #[test]
    fn guide_level_round_trips_through_form_value() {
        for level in StyleGuideLevel::ALL {
            assert_eq!(level.as_str().parse::<StyleGuideLevel>(), Ok(level));
        }
    }
}
