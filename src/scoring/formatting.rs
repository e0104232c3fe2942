use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};
use rust_decimal::Decimal;

use crate::activity::IssueActivity;
use crate::config::{mask_of, FormattingEvaluatorConfig};
use crate::error::{Error, Result};
use crate::models::ledger::{FormattingScore, Ledger, TagScore};
use crate::scoring::stage::ScoringStage;

#[derive(Debug, Clone, Copy, Default)]
struct MultiplierPair {
    formatting_multiplier: Decimal,
    word_value: Decimal,
}

/// Scores writing effort: renders each comment body into an element tree,
/// tallies weighted word counts per tag, and applies the author role's
/// multiplier pair. The result is the relevance-independent contribution
/// that the content evaluator later re-weights.
pub struct FormattingEvaluator {
    config: FormattingEvaluatorConfig,
    multipliers: HashMap<u32, MultiplierPair>,
}

impl FormattingEvaluator {
    pub fn new(config: FormattingEvaluatorConfig) -> Self {
        let multipliers = config
            .multipliers
            .iter()
            .map(|m| {
                (
                    mask_of(&m.role).bits(),
                    MultiplierPair {
                        formatting_multiplier: m.formatting_multiplier,
                        word_value: m.word_value,
                    },
                )
            })
            .collect();
        Self {
            config,
            multipliers,
        }
    }
}

#[async_trait]
impl ScoringStage for FormattingEvaluator {
    fn name(&self) -> &'static str {
        "formatting-evaluator"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn transform(&self, _activity: &IssueActivity, ledger: &mut Ledger) -> Result<()> {
        for entry in ledger.values_mut() {
            for comment in &mut entry.comments {
                let tree = parse_tree(&comment.content)?;
                let breakdown = tally(&tree, &self.config.scores);

                // Roles without a configured pair earn nothing
                let pair = self
                    .multipliers
                    .get(&comment.role.bits())
                    .copied()
                    .unwrap_or_default();

                let total = contribution(&breakdown, pair);
                comment.score.reward += total;
                comment.score.formatting = Some(FormattingScore {
                    breakdown,
                    multiplier: pair.formatting_multiplier,
                    word_value: pair.word_value,
                    total,
                });
            }
            entry.recompute_total();
        }
        Ok(())
    }
}

fn contribution(breakdown: &BTreeMap<String, TagScore>, pair: MultiplierPair) -> Decimal {
    breakdown.values().fold(Decimal::ZERO, |acc, tag| {
        acc + tag.score
            * pair.formatting_multiplier
            * (Decimal::from(tag.count) * pair.word_value)
    })
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Element {
    tag: String,
    children: Vec<Node>,
}

impl Element {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            children: Vec::new(),
        }
    }

    /// Rendered HTML separates block tags with newlines, inline tags with
    /// nothing; word counting must preserve that distinction.
    fn text_content(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(element) => {
                    let block = is_block(&element.tag);
                    if block {
                        out.push('\n');
                    }
                    element.text_content(out);
                    if block {
                        out.push('\n');
                    }
                }
            }
        }
    }
}

/// Renders a markdown comment body into an element tree. Unbalanced events
/// or unterminated raw markup make the whole run fail; malformed input is
/// not tolerated silently.
fn parse_tree(body: &str) -> Result<Element> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let mut stack = vec![Element::new("body")];

    for event in Parser::new_ext(body, options) {
        match event {
            Event::Start(tag) => stack.push(Element::new(tag_name(&tag))),
            Event::End(_) => {
                let mut done = stack
                    .pop()
                    .ok_or_else(|| Error::Render("unbalanced end of element".to_string()))?;
                // fenced code renders as <pre><code>…</code></pre>
                if done.tag == "pre" {
                    done.children = vec![Node::Element(Element {
                        tag: "code".to_string(),
                        children: std::mem::take(&mut done.children),
                    })];
                }
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| Error::Render("element closed past the root".to_string()))?;
                parent.children.push(Node::Element(done));
            }
            Event::Text(text) => push_text(&mut stack, &text)?,
            Event::Code(code) => {
                let mut element = Element::new("code");
                element.children.push(Node::Text(code.to_string()));
                push_element(&mut stack, element)?;
            }
            Event::Html(html) | Event::InlineHtml(html) => append_html(&mut stack, &html)?,
            Event::SoftBreak | Event::HardBreak => push_text(&mut stack, " ")?,
            Event::Rule => push_element(&mut stack, Element::new("hr"))?,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(Error::Render(format!(
            "{} unclosed element(s) at end of body",
            stack.len() - 1
        )));
    }
    Ok(stack.remove(0))
}

fn push_text(stack: &mut [Element], text: &str) -> Result<()> {
    let top = stack
        .last_mut()
        .ok_or_else(|| Error::Render("text outside of document".to_string()))?;
    top.children.push(Node::Text(text.to_string()));
    Ok(())
}

fn push_element(stack: &mut [Element], element: Element) -> Result<()> {
    let top = stack
        .last_mut()
        .ok_or_else(|| Error::Render("element outside of document".to_string()))?;
    top.children.push(Node::Element(element));
    Ok(())
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "ul"
            | "ol"
            | "li"
            | "table"
            | "thead"
            | "tbody"
            | "tr"
            | "td"
            | "th"
            | "div"
            | "hr"
            | "section"
            | "details"
            | "summary"
    )
}

/// Raw HTML is kept flat: each well-formed open tag becomes a childless
/// element and the surrounding text stays in the enclosing block, so the
/// words still count for the markdown structure around them.
fn append_html(stack: &mut [Element], html: &str) -> Result<()> {
    let mut rest = html;
    while let Some(lt) = rest.find('<') {
        let (text, tail) = rest.split_at(lt);
        if !text.is_empty() {
            push_text(stack, text)?;
        }
        let Some(gt) = tail.find('>') else {
            let snippet: String = tail.chars().take(32).collect();
            return Err(Error::Render(format!("unterminated markup at `{snippet}`")));
        };
        let tag_body = &tail[1..gt];
        rest = &tail[gt + 1..];

        // comments, doctypes, processing instructions, closers
        if tag_body.starts_with('!') || tag_body.starts_with('?') || tag_body.starts_with('/') {
            continue;
        }

        let name: String = tag_body
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if name.is_empty() {
            return Err(Error::Render(format!("malformed tag `<{tag_body}>`")));
        }
        push_element(stack, Element::new(name.to_lowercase()))?;
    }
    if !rest.is_empty() {
        push_text(stack, rest)?;
    }
    Ok(())
}

fn tag_name(tag: &Tag<'_>) -> &'static str {
    match tag {
        Tag::Paragraph => "p",
        Tag::Heading { level, .. } => match level {
            HeadingLevel::H1 => "h1",
            HeadingLevel::H2 => "h2",
            HeadingLevel::H3 => "h3",
            HeadingLevel::H4 => "h4",
            HeadingLevel::H5 => "h5",
            HeadingLevel::H6 => "h6",
        },
        Tag::BlockQuote(_) => "blockquote",
        Tag::CodeBlock(_) => "pre",
        Tag::List(Some(_)) => "ol",
        Tag::List(None) => "ul",
        Tag::Item => "li",
        Tag::Emphasis => "em",
        Tag::Strong => "strong",
        Tag::Strikethrough => "del",
        Tag::Link { .. } => "a",
        Tag::Image { .. } => "img",
        Tag::Table(_) => "table",
        Tag::TableHead => "thead",
        Tag::TableRow => "tr",
        Tag::TableCell => "td",
        Tag::FootnoteDefinition(_) => "section",
        Tag::HtmlBlock => "div",
        _ => "div",
    }
}

/// DOM `textContent` semantics: every element counts the words of all its
/// descendants, so text inside `<strong>` inside `<p>` counts for both.
fn tally(root: &Element, scores: &HashMap<String, Decimal>) -> BTreeMap<String, TagScore> {
    let mut breakdown = BTreeMap::new();
    collect(root, scores, &mut breakdown, true);
    breakdown
}

fn collect(
    element: &Element,
    scores: &HashMap<String, Decimal>,
    out: &mut BTreeMap<String, TagScore>,
    is_root: bool,
) {
    if !is_root {
        let mut text = String::new();
        element.text_content(&mut text);
        let words = text.split_whitespace().count() as u64;
        let score = scores
            .get(&element.tag)
            .copied()
            .unwrap_or(Decimal::ONE);
        let entry = out
            .entry(element.tag.clone())
            .or_insert(TagScore { count: 0, score });
        entry.count += words;
        entry.score = score;
    }
    for child in &element.children {
        if let Node::Element(inner) = child {
            collect(inner, scores, out, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn breakdown_of(body: &str) -> BTreeMap<String, TagScore> {
        tally(&parse_tree(body).unwrap(), &HashMap::new())
    }

    #[test]
    fn paragraph_counts_nested_words_for_both_tags() {
        let breakdown = breakdown_of("Hello **world** out there");
        assert_eq!(breakdown["p"].count, 4);
        assert_eq!(breakdown["strong"].count, 1);
    }

    #[test]
    fn code_blocks_and_lists_get_their_own_tags() {
        let breakdown = breakdown_of("- one\n- two three\n\n```\nlet x = 1;\n```\n");
        assert_eq!(breakdown["ul"].count, 3);
        assert_eq!(breakdown["li"].count, 3);
        assert!(breakdown.contains_key("pre"));
        assert!(breakdown.contains_key("code"));
    }

    #[test]
    fn inline_emphasis_does_not_split_words() {
        let breakdown = breakdown_of("we*ir*d");
        assert_eq!(breakdown["p"].count, 1);
        assert_eq!(breakdown["em"].count, 1);
    }

    #[test]
    fn configured_weight_overrides_default() {
        let mut scores = HashMap::new();
        scores.insert("code".to_string(), dec!(5));
        let breakdown = tally(&parse_tree("run `cargo test` now").unwrap(), &scores);
        assert_eq!(breakdown["code"].score, dec!(5));
        assert_eq!(breakdown["p"].score, dec!(1));
    }

    #[test]
    fn raw_html_tags_become_elements() {
        let breakdown = breakdown_of("press <kbd>Enter</kbd> to continue");
        assert!(breakdown.contains_key("kbd"));
        assert_eq!(breakdown["p"].count, 4);
    }

    #[test]
    fn unterminated_markup_is_a_render_failure() {
        let err = parse_tree("<div\nstill open").unwrap_err();
        assert!(matches!(err, Error::Render(_)));
    }

    #[test]
    fn contribution_follows_the_weighted_word_formula() {
        let mut breakdown = BTreeMap::new();
        breakdown.insert(
            "p".to_string(),
            TagScore {
                count: 2,
                score: dec!(1),
            },
        );
        breakdown.insert(
            "strong".to_string(),
            TagScore {
                count: 1,
                score: dec!(2),
            },
        );
        let pair = MultiplierPair {
            formatting_multiplier: dec!(1),
            word_value: dec!(1),
        };
        assert_eq!(contribution(&breakdown, pair), dec!(4));
    }

    #[test]
    fn unconfigured_role_earns_nothing() {
        let breakdown = breakdown_of("plenty of words in this paragraph");
        assert_eq!(contribution(&breakdown, MultiplierPair::default()), dec!(0));
    }
}
