//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate. Crawl-delay is
//! not covered by that crate, so the directive is extracted here, per
//! user-agent group.

use crate::robots::{Grant, Ruleset};
use robotstxt::matcher::{LongestMatchRobotsMatchStrategy, RobotsMatchStrategy};
use robotstxt::{get_path_params_query, parse_robotstxt, DefaultMatcher, RobotsParseHandler};
use std::time::Duration;

/// Largest crawl-delay honoured, anything above is clamped (one day)
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(86_400);

/// One `User-agent` group and the crawl-delay it declares
#[derive(Debug, Clone, PartialEq)]
struct AgentGroup {
    /// Lower-cased agent names of the group
    agents: Vec<String>,
    crawl_delay: Option<Duration>,
}

impl AgentGroup {
    fn is_global(&self) -> bool {
        self.agents.iter().any(|agent| agent == "*")
    }

    fn names(&self, token: &str) -> bool {
        !token.is_empty() && self.agents.iter().any(|agent| agent == token)
    }
}

/// Parsed robots.txt data
///
/// Keeps the raw document for the matcher and the crawl-delay groups
/// extracted up front.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    groups: Vec<AgentGroup>,
}

impl ParsedRobots {
    /// Creates a ParsedRobots from raw robots.txt content
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt file content
    ///
    /// # Returns
    ///
    /// A ParsedRobots instance that can be asked for grants
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            groups: parse_groups(content),
        }
    }

    /// Checks if a path is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `path` - The URL path to check (e.g., "/page.html")
    /// * `user_agent` - The user agent string
    pub fn is_allowed(&self, path: &str, user_agent: &str) -> bool {
        self.grant(user_agent, path).allowed
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// Groups naming the agent take precedence over `*` groups, even when
    /// they declare no delay themselves.
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - The crawl delay
    /// * `None` - If no crawl delay applies
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let token = product_token(user_agent).to_lowercase();

        let specific: Vec<&AgentGroup> = self
            .groups
            .iter()
            .filter(|group| group.names(&token))
            .collect();
        if !specific.is_empty() {
            return specific.iter().find_map(|group| group.crawl_delay);
        }

        self.groups
            .iter()
            .filter(|group| group.is_global())
            .find_map(|group| group.crawl_delay)
    }

    /// Returns the text of a 1-based line of the document
    fn line(&self, number: u32) -> Option<&str> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.content.lines().nth(index).map(str::trim)
    }
}

impl Ruleset for ParsedRobots {
    fn parse(body: &str) -> Option<Self> {
        Some(Self::from_content(body))
    }

    fn grant(&self, user_agent: &str, path: &str) -> Grant {
        let token = product_token(user_agent);

        let mut matcher = DefaultMatcher::default();
        let allowed = matcher.one_agent_allowed_by_robots(&self.content, token, path);

        let path = get_path_params_query(path);
        let mut tracker = ClauseTracker::new(token, &path);
        parse_robotstxt(&self.content, &mut tracker);
        let clause = self
            .line(tracker.matching_line())
            .unwrap_or_default()
            .to_string();

        Grant {
            allowed,
            clause,
            crawl_delay: self.crawl_delay(user_agent),
        }
    }
}

/// Best rule match seen so far: pattern length and line number
#[derive(Debug, Clone, Copy)]
struct RuleMatch {
    priority: i32,
    line: u32,
}

impl Default for RuleMatch {
    fn default() -> Self {
        Self {
            priority: -1,
            line: 0,
        }
    }
}

impl RuleMatch {
    fn offer(&mut self, priority: i32, line: u32) {
        if self.priority < priority {
            self.priority = priority;
            self.line = line;
        }
    }
}

#[derive(Debug, Default)]
struct RuleMatches {
    allow: RuleMatch,
    disallow: RuleMatch,
}

impl RuleMatches {
    /// The rule that decides, Allow winning ties
    fn decisive(&self) -> RuleMatch {
        if self.disallow.priority > self.allow.priority {
            self.disallow
        } else {
            self.allow
        }
    }
}

/// Parse handler locating the Allow/Disallow line that decides a path
///
/// Groups are selected the way the robotstxt matcher selects them: rules of
/// groups naming the agent shadow the `*` groups, and the longest matching
/// pattern wins.
struct ClauseTracker<'a> {
    agent: &'a str,
    path: &'a str,
    global: RuleMatches,
    specific: RuleMatches,
    in_global: bool,
    in_specific: bool,
    ever_specific: bool,
    seen_separator: bool,
}

impl<'a> ClauseTracker<'a> {
    fn new(agent: &'a str, path: &'a str) -> Self {
        Self {
            agent,
            path,
            global: RuleMatches::default(),
            specific: RuleMatches::default(),
            in_global: false,
            in_specific: false,
            ever_specific: false,
            seen_separator: false,
        }
    }

    /// 1-based line of the deciding rule, 0 if none matched
    fn matching_line(&self) -> u32 {
        if self.ever_specific {
            self.specific.decisive().line
        } else {
            self.global.decisive().line
        }
    }

    fn record(&mut self, allow: bool, line: u32, pattern: &str) {
        if !(self.in_global || self.in_specific) {
            return;
        }
        self.seen_separator = true;

        if LongestMatchRobotsMatchStrategy::matches(self.path, pattern) {
            let priority = i32::try_from(pattern.len()).unwrap_or(i32::MAX);
            let matches = if self.in_specific {
                &mut self.specific
            } else {
                &mut self.global
            };
            if allow {
                matches.allow.offer(priority, line);
            } else {
                matches.disallow.offer(priority, line);
            }
        } else if allow {
            // "Allow: /dir/index.html" also allows "/dir/"
            if let Some(slash) = pattern.rfind('/') {
                if pattern[slash..].starts_with("/index.htm") {
                    let normalized = format!("{}$", &pattern[..=slash]);
                    self.record(true, line, &normalized);
                }
            }
        }
    }
}

impl RobotsParseHandler for ClauseTracker<'_> {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {}

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        if self.seen_separator {
            self.in_global = false;
            self.in_specific = false;
            self.seen_separator = false;
        }

        let global = user_agent.starts_with('*')
            && (user_agent.len() == 1 || user_agent[1..].starts_with(char::is_whitespace));
        if global {
            self.in_global = true;
        } else if product_token(user_agent).eq_ignore_ascii_case(self.agent) {
            self.in_specific = true;
            self.ever_specific = true;
        }
    }

    fn handle_allow(&mut self, line_num: u32, value: &str) {
        self.record(true, line_num, value);
    }

    fn handle_disallow(&mut self, line_num: u32, value: &str) {
        self.record(false, line_num, value);
    }

    fn handle_sitemap(&mut self, _line_num: u32, _value: &str) {
        self.seen_separator = true;
    }

    fn handle_unknown_action(&mut self, _line_num: u32, _action: &str, _value: &str) {
        self.seen_separator = true;
    }
}

/// Extracts the product token robots.txt groups are matched against
///
/// `"WardenBot/1.0 (+https://example.com)"` yields `"WardenBot"`.
pub fn product_token(user_agent: &str) -> &str {
    let trimmed = user_agent.trim_start();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '_' || c == '-'))
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Splits the document into user-agent groups
///
/// Consecutive `User-agent` lines share one group; any other directive closes
/// the run so the next `User-agent` starts a new group.
fn parse_groups(content: &str) -> Vec<AgentGroup> {
    let mut groups: Vec<AgentGroup> = Vec::new();
    let mut collecting_agents = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_lowercase().as_str() {
            "user-agent" => {
                if !collecting_agents {
                    groups.push(AgentGroup {
                        agents: Vec::new(),
                        crawl_delay: None,
                    });
                    collecting_agents = true;
                }
                if let Some(group) = groups.last_mut() {
                    group.agents.push(product_token(value).to_lowercase());
                    if value.starts_with('*') {
                        group.agents.push("*".to_string());
                    }
                }
            }
            "crawl-delay" => {
                collecting_agents = false;
                if let (Some(group), Some(delay)) = (groups.last_mut(), parse_delay(value)) {
                    group.crawl_delay.get_or_insert(delay);
                }
            }
            _ => collecting_agents = false,
        }
    }

    groups
}

/// Parses a crawl-delay value in (possibly fractional) seconds
fn parse_delay(value: &str) -> Option<Duration> {
    let seconds: f64 = value.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds.min(MAX_CRAWL_DELAY.as_secs_f64())))
}
