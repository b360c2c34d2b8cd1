//! Keyword table: which keywords exist, where they may appear and how their
//! data is shaped.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Runspec,
    Grid,
    Edit,
    Props,
    Regions,
    Solution,
    Summary,
    Schedule,
}

impl Section {
    pub const REQUIRED: [Section; 5] = [
        Section::Runspec,
        Section::Grid,
        Section::Props,
        Section::Solution,
        Section::Schedule,
    ];

    pub fn from_keyword(name: &str) -> Option<Self> {
        match name {
            "RUNSPEC" => Some(Self::Runspec),
            "GRID" => Some(Self::Grid),
            "EDIT" => Some(Self::Edit),
            "PROPS" => Some(Self::Props),
            "REGIONS" => Some(Self::Regions),
            "SOLUTION" => Some(Self::Solution),
            "SUMMARY" => Some(Self::Summary),
            "SCHEDULE" => Some(Self::Schedule),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Runspec => "RUNSPEC",
            Self::Grid => "GRID",
            Self::Edit => "EDIT",
            Self::Props => "PROPS",
            Self::Regions => "REGIONS",
            Self::Solution => "SOLUTION",
            Self::Summary => "SUMMARY",
            Self::Schedule => "SCHEDULE",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Record layout of a keyword's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// No data follows.
    Flag,
    /// Exactly one record terminated by `/`.
    Single,
    /// Records until an empty record (`/` alone).
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordSpec {
    pub shape: Shape,
    pub sections: &'static [Section],
}

const RUNSPEC: &[Section] = &[Section::Runspec];
const GRID: &[Section] = &[Section::Grid];
const EDIT: &[Section] = &[Section::Edit];
const PROPS: &[Section] = &[Section::Props];
const REGIONS: &[Section] = &[Section::Regions];
const SOLUTION: &[Section] = &[Section::Solution];
const SUMMARY: &[Section] = &[Section::Summary];
const SCHEDULE: &[Section] = &[Section::Schedule];
const REPORTING: &[Section] = &[Section::Solution, Section::Schedule];
const ANY: &[Section] = &[
    Section::Runspec,
    Section::Grid,
    Section::Edit,
    Section::Props,
    Section::Regions,
    Section::Solution,
    Section::Summary,
    Section::Schedule,
];

/// Look up a keyword. `section` is needed because summary vectors are
/// recognised by pattern rather than listed one by one.
pub fn lookup(name: &str, section: Option<Section>) -> Option<KeywordSpec> {
    use Shape::*;
    let spec = |shape, sections| Some(KeywordSpec { shape, sections });

    match name {
        "INCLUDE" => spec(Single, ANY),
        "END" => spec(Flag, ANY),

        "TITLE" | "DIMENS" | "START" | "WELLDIMS" | "TABDIMS" | "EQLDIMS" => {
            spec(Single, RUNSPEC)
        }
        "OIL" | "WATER" | "GAS" | "METRIC" | "FIELD" | "LAB" | "UNIFIN" | "UNIFOUT" => {
            spec(Flag, RUNSPEC)
        }

        "INIT" => spec(Flag, GRID),
        "DXV" | "DYV" | "DZV" | "DX" | "DY" | "DZ" | "TOPS" | "COORD" | "ZCORN" | "PORO"
        | "PERMX" | "PERMY" | "PERMZ" | "NTG" => spec(Single, GRID),

        "MULTPV" => spec(Single, EDIT),

        "SWOF" | "SGOF" | "PVTW" | "PVDO" | "PVDG" | "DENSITY" | "ROCK" => spec(Single, PROPS),

        "SATNUM" | "PVTNUM" | "EQLNUM" => spec(Single, REGIONS),

        "EQUIL" => spec(Single, SOLUTION),
        "RPTRST" | "RPTSOL" | "RPTSCHED" => spec(Single, REPORTING),

        "WELSPECS" | "COMPDAT" | "WCONPROD" | "WCONINJE" | "DATES" => spec(Multi, SCHEDULE),
        "TSTEP" => spec(Single, SCHEDULE),

        _ if section == Some(Section::Summary) => summary_vector(name),
        _ => None,
    }
}

fn summary_vector(name: &str) -> Option<KeywordSpec> {
    let valid_body = name.len() >= 3
        && name.len() <= 8
        && name[1..].bytes().all(|b| b.is_ascii_uppercase());
    match name.as_bytes().first() {
        _ if matches!(name, "ALL" | "RUNSUM" | "SEPARATE" | "EXCEL") => Some(KeywordSpec {
            shape: Shape::Flag,
            sections: SUMMARY,
        }),
        Some(b'F') if valid_body => Some(KeywordSpec {
            shape: Shape::Flag,
            sections: SUMMARY,
        }),
        // Well vectors take a well list, empty meaning all wells.
        Some(b'W') if valid_body => Some(KeywordSpec {
            shape: Shape::Single,
            sections: SUMMARY,
        }),
        _ => None,
    }
}

/// True when the word has the lexical form of a keyword.
pub fn looks_like_keyword(word: &str) -> bool {
    let bytes = word.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 8
        && bytes[0].is_ascii_uppercase()
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || *b == b'_' || *b == b'-' || *b == b'+')
}
