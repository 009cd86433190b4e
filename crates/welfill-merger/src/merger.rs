//! Override merging

use crate::era::EraCalendar;
use chrono::{Datelike, NaiveDate};
use tracing::debug;
use welfill_domain::vocabulary::date_keys;
use welfill_domain::{FieldValues, ManualOverrides, ResolvedFieldMapping, TemplateDescriptor};

/// Resolves extracted values against manual overrides
#[derive(Debug, Clone, Default)]
pub struct OverrideMerger {
    era: EraCalendar,
}

impl OverrideMerger {
    /// Create a merger rendering era dates with `era`
    pub fn new(era: EraCalendar) -> Self {
        Self { era }
    }

    /// Era used for `開催日（令和〇年〇月〇日）`
    pub fn era(&self) -> &EraCalendar {
        &self.era
    }

    /// Merge extracted values with the user's manual fields
    ///
    /// Starting from `extracted`, every manual value is written under all of
    /// its alias keys, then `date_value` (`YYYY-MM-DD`) is fanned out into
    /// the date keys. Both overwrite extracted values. A date that does not
    /// parse is skipped. The template's sheet name rides along in the
    /// reserved `_sheet_name` field.
    pub fn merge(
        &self,
        extracted: FieldValues,
        manual: &ManualOverrides,
        date_value: Option<&str>,
        template: &TemplateDescriptor,
    ) -> ResolvedFieldMapping {
        let mut values = extracted;

        for (field, value) in manual.iter() {
            for key in field.aliases() {
                values.insert(*key, value);
            }
        }

        if let Some(raw) = date_value.filter(|d| !d.trim().is_empty()) {
            match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => self.insert_dates(&mut values, date),
                Err(e) => debug!("Skipping date derivation for '{}': {}", raw, e),
            }
        }

        ResolvedFieldMapping::new(values, template.sheet_name.as_deref())
    }

    /// Merge with prior-stage values filling whatever extraction left absent
    pub fn merge_with_prior(
        &self,
        mut extracted: FieldValues,
        prior: Option<&FieldValues>,
        manual: &ManualOverrides,
        date_value: Option<&str>,
        template: &TemplateDescriptor,
    ) -> ResolvedFieldMapping {
        if let Some(prior) = prior {
            extracted.backfill_from(prior);
        }
        self.merge(extracted, manual, date_value, template)
    }

    fn insert_dates(&self, values: &mut FieldValues, date: NaiveDate) {
        values.insert(date_keys::YEAR, format!("{}年", date.year()));
        values.insert(date_keys::MONTH, format!("{}月", date.month()));
        values.insert(date_keys::DAY, format!("{}日", date.day()));

        let full = date.format("%Y年%m月%d日").to_string();
        for key in date_keys::FULL_DATE {
            values.insert(key, full.as_str());
        }

        match self.era.format(date) {
            Some(era_date) => {
                values.insert(date_keys::ERA_DATE, era_date);
            }
            None => debug!("{} precedes the {} era, skipping era date", date, self.era.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use welfill_domain::{FieldMapping, ManualField};

    fn template() -> TemplateDescriptor {
        TemplateDescriptor {
            id: "assessment".to_string(),
            display_name: "アセスメント".to_string(),
            source_file: "template/assessment.xlsx".into(),
            sheet_name: Some("Sheet1".to_string()),
            field_mapping: FieldMapping::default(),
            prior_stage: None,
            extraction_hint: None,
        }
    }

    fn manual(pairs: &[(ManualField, &str)]) -> ManualOverrides {
        pairs.iter().map(|(f, v)| (*f, *v)).collect()
    }

    #[test]
    fn test_manual_wins_over_every_alias() {
        let extracted: FieldValues = [("氏名", "AI名"), ("利用者様", "AI様"), ("備考", "メモ")]
            .into_iter()
            .collect();
        let overrides = manual(&[(ManualField::UserName, "山田 太郎")]);

        let resolved = OverrideMerger::default().merge(extracted, &overrides, None, &template());

        assert_eq!(resolved.get("利用者氏名"), Some("山田 太郎"));
        assert_eq!(resolved.get("氏名"), Some("山田 太郎"));
        assert_eq!(resolved.get("利用者様"), Some("山田 太郎"));
        assert_eq!(resolved.get("備考"), Some("メモ"));
    }

    #[test]
    fn test_alias_fan_out() {
        let overrides = manual(&[
            (ManualField::UserNameFurigana, "やまだ"),
            (ManualField::StaffName, "佐藤"),
            (ManualField::CmLocation, "会議室"),
            (ManualField::CmTime, "10:00"),
            (ManualField::CmAttendees, "本人、家族"),
            (ManualField::CmServiceManager, "鈴木"),
            (ManualField::Location, "自宅"),
        ]);

        let resolved =
            OverrideMerger::default().merge(FieldValues::new(), &overrides, None, &template());

        assert_eq!(resolved.get("利用者氏名_ふりがな"), Some("やまだ"));
        assert_eq!(resolved.get("氏名のふりがな"), Some("やまだ"));
        assert_eq!(resolved.get("作成者"), Some("佐藤"));
        assert_eq!(resolved.get("開催場所"), Some("会議室"));
        assert_eq!(resolved.get("開催時間"), Some("10:00"));
        assert_eq!(resolved.get("会議出席者"), Some("本人、家族"));
        assert_eq!(resolved.get("サービス管理責任者"), Some("鈴木"));
        // Prompt-only fields have no keys of their own
        assert_eq!(resolved.fields().count(), 7);
    }

    #[test]
    fn test_date_fan_out() {
        let extracted: FieldValues = [("日付", "AIの日付")].into_iter().collect();
        let resolved = OverrideMerger::default().merge(
            extracted,
            &ManualOverrides::new(),
            Some("2026-05-20"),
            &template(),
        );

        assert_eq!(resolved.get("作成年_西暦"), Some("2026年"));
        assert_eq!(resolved.get("作成月"), Some("5月"));
        assert_eq!(resolved.get("作成日"), Some("20日"));
        assert_eq!(resolved.get("作成年月日"), Some("2026年05月20日"));
        assert_eq!(resolved.get("日付"), Some("2026年05月20日"));
        assert_eq!(resolved.get("実施日"), Some("2026年05月20日"));
        assert_eq!(resolved.get("開催日（令和〇年〇月〇日）"), Some("令和8年5月20日"));
    }

    #[test]
    fn test_unparsable_date_is_skipped() {
        let extracted: FieldValues = [("日付", "AIの日付")].into_iter().collect();
        let resolved = OverrideMerger::default().merge(
            extracted,
            &ManualOverrides::new(),
            Some("2026/05/20"),
            &template(),
        );

        assert_eq!(resolved.get("日付"), Some("AIの日付"));
        assert!(resolved.get("作成年_西暦").is_none());
        assert!(resolved.get("開催日（令和〇年〇月〇日）").is_none());
    }

    #[test]
    fn test_pre_era_date_skips_only_era_field() {
        let resolved = OverrideMerger::default().merge(
            FieldValues::new(),
            &ManualOverrides::new(),
            Some("2018-12-01"),
            &template(),
        );
        assert_eq!(resolved.get("作成年月日"), Some("2018年12月01日"));
        assert!(resolved.get("開催日（令和〇年〇月〇日）").is_none());
    }

    #[test]
    fn test_sheet_name_attached() {
        let extracted: FieldValues = [("_sheet_name", "spoofed")].into_iter().collect();
        let resolved =
            OverrideMerger::default().merge(extracted, &ManualOverrides::new(), None, &template());
        assert_eq!(resolved.sheet_name(), Some("Sheet1"));
        assert_eq!(resolved.fields().count(), 0);
    }

    #[test]
    fn test_prior_backfills_below_extraction() {
        let prior: FieldValues = [("氏名", "前回の名前"), ("支援内容", "前回の支援")]
            .into_iter()
            .collect();
        let extracted: FieldValues = [("支援内容", "今回の支援")].into_iter().collect();
        let overrides = manual(&[(ManualField::StaffName, "佐藤")]);

        let resolved = OverrideMerger::default().merge_with_prior(
            extracted,
            Some(&prior),
            &overrides,
            None,
            &template(),
        );

        assert_eq!(resolved.get("氏名"), Some("前回の名前"));
        assert_eq!(resolved.get("支援内容"), Some("今回の支援"));
        assert_eq!(resolved.get("作成者"), Some("佐藤"));
    }

    proptest! {
        #[test]
        fn prop_manual_always_wins(ai in "[^\\s]{1,12}", typed in "[^\\s]{1,12}") {
            let extracted: FieldValues = [
                ("利用者氏名", ai.as_str()),
                ("氏名", ai.as_str()),
                ("作成者", ai.as_str()),
            ]
            .into_iter()
            .collect();
            let overrides = manual(&[
                (ManualField::UserName, typed.as_str()),
                (ManualField::StaffName, typed.as_str()),
            ]);

            let resolved = OverrideMerger::default().merge(extracted, &overrides, None, &template());

            for key in ManualField::UserName.aliases().iter().chain(ManualField::StaffName.aliases()) {
                prop_assert_eq!(resolved.get(key), Some(typed.as_str()));
            }
        }
    }
}
