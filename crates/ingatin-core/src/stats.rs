// SPDX-FileCopyrightText: 2026 Ingat-In Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attendance statistics derived from the current user list.

use crate::types::{Shift, User};

/// Done/pending counts for one attendance shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStats {
    /// Users who already checked in.
    pub sudah: usize,
    /// Users still pending.
    pub belum: usize,
    /// `round(100 * sudah / total)`, or 0 for an empty list.
    pub percentage: u32,
}

/// Dashboard summary. Recomputed on every render, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceStats {
    pub total_users: usize,
    pub absen_pagi: CategoryStats,
    pub absen_sore: CategoryStats,
}

impl AttendanceStats {
    pub fn from_users(users: &[User]) -> Self {
        let total_users = users.len();
        Self {
            total_users,
            absen_pagi: category(users, Shift::Morning),
            absen_sore: category(users, Shift::Evening),
        }
    }

    /// Stats for one shift.
    pub fn shift(&self, shift: Shift) -> CategoryStats {
        match shift {
            Shift::Morning => self.absen_pagi,
            Shift::Evening => self.absen_sore,
        }
    }
}

fn category(users: &[User], shift: Shift) -> CategoryStats {
    let total = users.len();
    let sudah = users.iter().filter(|u| shift.is_done(u)).count();
    CategoryStats {
        sudah,
        belum: total - sudah,
        percentage: percentage(sudah, total),
    }
}

/// Integer percentage rounded half up, 0 when `total` is 0.
pub fn percentage(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * done + total) / (2 * total)) as u32
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::types::UserId;

    fn user(i: usize, pagi: bool, sore: bool) -> User {
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        User {
            id: UserId(format!("u-{i}")),
            number: format!("62812{i:06}@s.whatsapp.net"),
            name: None,
            absen_pagi: pagi,
            absen_sore: sore,
            last_checkin: None,
            suspend_until: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn empty_list_is_all_zero() {
        let stats = AttendanceStats::from_users(&[]);
        assert_eq!(stats, AttendanceStats::default());
    }

    #[test]
    fn counts_each_shift_independently() {
        let users = vec![
            user(0, true, false),
            user(1, true, true),
            user(2, false, false),
        ];
        let stats = AttendanceStats::from_users(&users);
        assert_eq!(stats.total_users, 3);
        assert_eq!(
            stats.absen_pagi,
            CategoryStats {
                sudah: 2,
                belum: 1,
                percentage: 67
            }
        );
        assert_eq!(
            stats.shift(Shift::Evening),
            CategoryStats {
                sudah: 1,
                belum: 2,
                percentage: 33
            }
        );
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(1, 200), 1); // 0.5
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
    }

    proptest! {
        #[test]
        fn sudah_plus_belum_is_total(flags in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..64)) {
            let users: Vec<User> = flags
                .iter()
                .enumerate()
                .map(|(i, (p, s))| user(i, *p, *s))
                .collect();
            let stats = AttendanceStats::from_users(&users);
            for cat in [stats.absen_pagi, stats.absen_sore] {
                prop_assert_eq!(cat.sudah + cat.belum, stats.total_users);
                let expected = if stats.total_users == 0 {
                    0
                } else {
                    (100.0 * cat.sudah as f64 / stats.total_users as f64).round() as u32
                };
                prop_assert_eq!(cat.percentage, expected);
            }
        }
    }
}
