//! Small utility helpers used across modules.

/// Replace occurrences of `{key}` in the template with the provided values.
/// Pairs are applied in order; no nesting or escaping.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Cut `s` to at most `max` characters, marking the cut with "...".
pub fn truncate_display(s: &str, max: usize) -> String {
  match s.char_indices().nth(max) {
    Some((cut, _)) => format!("{}...", &s[..cut]),
    None => s.to_string(),
  }
}

/// Cut `s` to at most `max` characters without a marker.
pub fn clip(s: &str, max: usize) -> String { s.chars().take(max).collect() }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_keys_are_replaced_everywhere() {
    let out = fill_template("{{iv}: {expr} for {iv} in {src}}", &[("iv", "x"), ("expr", "x * 2"), ("src", "nums")]);
    assert_eq!(out, "{x: x * 2 for x in nums}");
  }

  #[test]
  fn truncation_counts_characters() {
    assert_eq!(truncate_display("abc", 3), "abc");
    assert_eq!(truncate_display("abcd", 3), "abc...");
    assert_eq!(truncate_display("ééé", 2), "éé...");
    assert_eq!(clip("ééé", 2), "éé");
    assert_eq!(clip("ab", 5), "ab");
  }
}
