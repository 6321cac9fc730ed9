use std::fmt;

use crate::error::Result;
use crate::hash::ObjectId;
use crate::repo::Repository;
use crate::types::{Commit, Signature};

use super::walk::{RevWalk, WalkOrder};

/// commit with its id for log output
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: ObjectId,
    pub commit: Commit,
}

/// commit history starting at a revision, newest first
pub fn log(repo: &Repository, rev: &str, max_count: Option<usize>) -> Result<Vec<LogEntry>> {
    let start = repo.refs().resolve_rev(rev)?;

    let mut walk = RevWalk::new(repo);
    walk.sorting(WalkOrder::Time);
    walk.push(start)?;

    let mut entries = Vec::new();
    for id in walk.take(max_count.unwrap_or(usize::MAX)) {
        let id = id?;
        let commit = repo.objects().read_commit(&id)?;
        entries.push(LogEntry { id, commit });
    }

    Ok(entries)
}

/// format a log entry for display
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "commit {}", self.id)?;
        if self.commit.is_merge() {
            let parents: Vec<String> = self.commit.parents.iter().map(|p| p.short()).collect();
            writeln!(f, "Merge: {}", parents.join(" "))?;
        }
        writeln!(
            f,
            "Author: {} <{}>",
            self.commit.author.name, self.commit.author.email
        )?;
        writeln!(f, "Date:   {}", format_date(&self.commit.author))?;

        writeln!(f)?;
        for line in self.commit.message.lines() {
            writeln!(f, "    {}", line)?;
        }

        Ok(())
    }
}

/// `YYYY-MM-DD HH:MM:SS +hhmm` in the signature's own offset
fn format_date(sig: &Signature) -> String {
    let local = sig.time.saturating_add(i64::from(sig.offset_minutes) * 60);
    let days = local.div_euclid(86400);
    let secs = local.rem_euclid(86400);
    let (year, month, day) = civil_from_days(days);

    let sign = if sig.offset_minutes < 0 { '-' } else { '+' };
    let offset = sig.offset_minutes.unsigned_abs();

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} {}{:02}{:02}",
        year,
        month,
        day,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60,
        sign,
        offset / 60,
        offset % 60
    )
}

// days since 1970-01-01 to a proleptic gregorian date
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{commit, CommitRequest};
    use crate::refs::HEAD;
    use crate::types::Tree;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path(), false).unwrap();
        (dir, repo)
    }

    fn commit_head(repo: &Repository, message: &str, time: i64) -> ObjectId {
        let sig = Signature::new("Test Author", "author@example.com", time, 0).unwrap();
        commit(
            repo,
            CommitRequest {
                update_ref: Some(HEAD.to_string()),
                author: sig.clone(),
                committer: sig,
                message: message.to_string(),
                tree: repo.objects().write_tree(&Tree::empty()).unwrap(),
                parents: repo.head_commit().unwrap().into_iter().collect(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_log_single_commit() {
        let (_dir, repo) = test_repo();
        commit_head(&repo, "first commit", 100);

        let entries = log(&repo, "main", None).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].commit.message, "first commit");
    }

    #[test]
    fn test_log_multiple_commits() {
        let (_dir, repo) = test_repo();

        for i in 0..3 {
            commit_head(&repo, &format!("commit {}", i), 100 + i);
        }

        let entries = log(&repo, "HEAD", None).unwrap();

        let messages: Vec<_> = entries.iter().map(|e| e.commit.message.as_str()).collect();
        assert_eq!(messages, vec!["commit 2", "commit 1", "commit 0"]);
    }

    #[test]
    fn test_log_max_count() {
        let (_dir, repo) = test_repo();

        for i in 0..5 {
            commit_head(&repo, &format!("commit {}", i), 100 + i);
        }

        let entries = log(&repo, "main", Some(2)).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].commit.message, "commit 4");
    }

    #[test]
    fn test_log_entry_display() {
        let (_dir, repo) = test_repo();
        let id = commit_head(&repo, "test message", 1_700_000_000);

        let entries = log(&repo, &id.to_hex(), None).unwrap();
        let display = format!("{}", entries[0]);

        assert!(display.starts_with(&format!("commit {}", id)));
        assert!(display.contains("Author: Test Author <author@example.com>"));
        assert!(display.contains("Date:   2023-11-14 22:13:20 +0000"));
        assert!(display.contains("    test message"));
    }

    #[test]
    fn test_format_date_with_offset() {
        let sig = Signature::new("a", "b", 0, -90).unwrap();
        assert_eq!(format_date(&sig), "1969-12-31 22:30:00 -0130");

        let sig = Signature::new("a", "b", 951_782_400, 0).unwrap();
        assert_eq!(format_date(&sig), "2000-02-29 00:00:00 +0000");
    }

    #[test]
    fn test_format_date_extreme_timestamps() {
        let late = Signature::parse("a <b> 9223372036854775807 +0100").unwrap();
        assert!(format_date(&late).ends_with(" +0100"));

        let early = Signature::parse("a <b> -9223372036854775808 -0100").unwrap();
        assert!(format_date(&early).ends_with(" -0100"));
    }
}
