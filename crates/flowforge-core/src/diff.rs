//! Unified diff parsing.
//!
//! Only the new side matters to checkers: which lines were added and at
//! which line number they sit in the staged file.

use crate::domain::AddedLine;

/// New-side start line of a hunk header `@@ -a,b +c,d @@`.
pub fn hunk_new_start(header: &str) -> Option<u32> {
    static_regex!(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,\d+)? @@")
        .captures(header)
        .and_then(|c| c[1].parse().ok())
}

/// Lines added by a unified diff of a single file.
pub fn parse_added_lines(diff: &str) -> Vec<AddedLine> {
    let mut added = Vec::new();
    let mut next_line: Option<u32> = None;

    for line in diff.lines() {
        if line.starts_with("diff --git ") {
            next_line = None;
            continue;
        }
        if line.starts_with("@@") {
            next_line = hunk_new_start(line);
            continue;
        }
        // File headers (`--- a/x`, `+++ b/x`) come before the first hunk.
        let Some(current) = next_line.as_mut() else {
            continue;
        };
        match line.as_bytes().first() {
            Some(b'+') => {
                added.push(AddedLine {
                    line: *current,
                    text: line[1..].to_string(),
                });
                *current += 1;
            }
            Some(b' ') => *current += 1,
            // Removed lines and "\ No newline at end of file" leave the new side alone.
            _ => {}
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hunk_header() {
        assert_eq!(hunk_new_start("@@ -10,2 +12,3 @@ fn main()"), Some(12));
        assert_eq!(hunk_new_start("@@ -0,0 +1 @@"), Some(1));
        assert_eq!(hunk_new_start("@@ broken @@"), None);
    }

    #[test]
    fn test_zero_context_diff() {
        let diff = "\
diff --git a/src/a.ts b/src/a.ts
index 1111111..2222222 100644
--- a/src/a.ts
+++ b/src/a.ts
@@ -3,0 +4,2 @@ export function a() {
+  console.log(a);
+  return a;
@@ -10 +12 @@ export function b() {
-  return 1;
+  return 2;
";
        let added = parse_added_lines(diff);
        let lines: Vec<(u32, &str)> = added.iter().map(|a| (a.line, a.text.as_str())).collect();
        assert_eq!(
            lines,
            vec![(4, "  console.log(a);"), (5, "  return a;"), (12, "  return 2;")]
        );
    }

    #[test]
    fn test_context_lines_advance_numbering() {
        let diff = "\
@@ -1,3 +1,4 @@
 keep
+new
 keep
\\ No newline at end of file
";
        let added = parse_added_lines(diff);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].line, 2);
    }

    #[test]
    fn test_added_line_starting_with_plus_signs() {
        let diff = "@@ -0,0 +1 @@\n+++counter;\n";
        let added = parse_added_lines(diff);
        assert_eq!(added[0].text, "++counter;");
    }
}
