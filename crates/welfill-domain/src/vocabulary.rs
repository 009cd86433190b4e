//! Closed field vocabulary and alias tables
//!
//! Templates were authored at different times and name the same concept
//! differently (`氏名`, `利用者氏名`, `利用者様`). Everything that maps a manual
//! input or a derived value onto template field keys is enumerated here as
//! static data.

/// Reserved pseudo-field carrying the target sheet name to the filler
pub const SHEET_NAME_FIELD: &str = "_sheet_name";

/// Field keys probed, in order, when naming an output file
pub const NAME_CANDIDATE_KEYS: [&str; 4] = ["氏名", "利用者名", "利用者様", "利用者氏名"];

/// Furigana key probed when no name candidate is set
pub const NAME_FURIGANA_FALLBACK_KEY: &str = "氏名のふりがな";

/// Placeholder used in output filenames when no user name is known
pub const UNSET_NAME: &str = "名称未設定";

/// Keys filled from a manual date, one per rendering
pub mod date_keys {
    /// Gregorian year, e.g. `2026年`
    pub const YEAR: &str = "作成年_西暦";
    /// Month without padding, e.g. `5月`
    pub const MONTH: &str = "作成月";
    /// Day without padding, e.g. `20日`
    pub const DAY: &str = "作成日";
    /// Full date keys, each rendered `2026年05月20日`
    pub const FULL_DATE: [&str; 3] = ["作成年月日", "日付", "実施日"];
    /// Era-calendar date, e.g. `令和8年5月20日`
    pub const ERA_DATE: &str = "開催日（令和〇年〇月〇日）";
}

/// A manual form field the user can fill in next to the free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManualField {
    /// Service user's name
    UserName,
    /// Service user's name in kana
    UserNameFurigana,
    /// Staff member writing the record
    StaffName,
    /// Record date, `YYYY-MM-DD`
    Date,
    /// Location
    Location,
    /// Time
    Time,
    /// Session count
    Count,
    /// Next scheduled date
    NextDate,
    /// Case meeting location
    CmLocation,
    /// Case meeting time
    CmTime,
    /// Case meeting attendees
    CmAttendees,
    /// Case meeting service manager
    CmServiceManager,
}

impl ManualField {
    /// Every manual field, in the order they appear in the prompt block
    pub const ALL: [ManualField; 12] = [
        ManualField::UserName,
        ManualField::UserNameFurigana,
        ManualField::StaffName,
        ManualField::Date,
        ManualField::Location,
        ManualField::Time,
        ManualField::Count,
        ManualField::NextDate,
        ManualField::CmServiceManager,
        ManualField::CmLocation,
        ManualField::CmTime,
        ManualField::CmAttendees,
    ];

    /// Multipart form key
    pub fn form_key(&self) -> &'static str {
        match self {
            ManualField::UserName => "user_name",
            ManualField::UserNameFurigana => "user_name_furigana",
            ManualField::StaffName => "staff_name",
            ManualField::Date => "date",
            ManualField::Location => "location",
            ManualField::Time => "time",
            ManualField::Count => "count",
            ManualField::NextDate => "next_date",
            ManualField::CmLocation => "cm_location",
            ManualField::CmTime => "cm_time",
            ManualField::CmAttendees => "cm_attendees",
            ManualField::CmServiceManager => "cm_service_manager",
        }
    }

    /// Look up a field by its form key
    pub fn from_form_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.form_key() == key)
    }

    /// Label shown to the extractor in the basic-information block
    pub fn label(&self) -> &'static str {
        match self {
            ManualField::UserName => "利用者名 (User Name)",
            ManualField::UserNameFurigana => "利用者名ふりがな (User Name Furigana)",
            ManualField::StaffName => "作成担当者 (Staff Name)",
            ManualField::Date => "日付 (Date)",
            ManualField::Location => "開催場所 (Location)",
            ManualField::Time => "時間 (Time)",
            ManualField::Count => "回数 (Count)",
            ManualField::NextDate => "次回予定 (Next Date)",
            ManualField::CmLocation => "開催場所 (Location)",
            ManualField::CmTime => "開催時間 (Time)",
            ManualField::CmAttendees => "会議出席者 (Attendees)",
            ManualField::CmServiceManager => "サービス管理責任者 (Service Manager)",
        }
    }

    /// Template field keys this manual value is stamped onto
    ///
    /// Empty for fields that only inform the extractor. The date is not
    /// aliased; it is decomposed by the merger instead.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            ManualField::UserName => &["利用者氏名", "氏名", "利用者様"],
            ManualField::UserNameFurigana => &["利用者氏名_ふりがな", "氏名のふりがな"],
            ManualField::StaffName => &["作成者"],
            ManualField::CmLocation => &["開催場所"],
            ManualField::CmTime => &["開催時間"],
            ManualField::CmAttendees => &["会議出席者"],
            ManualField::CmServiceManager => &["サービス管理責任者"],
            ManualField::Date
            | ManualField::Location
            | ManualField::Time
            | ManualField::Count
            | ManualField::NextDate => &[],
        }
    }
}
