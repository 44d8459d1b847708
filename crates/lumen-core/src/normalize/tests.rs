use super::*;

fn n(raw: &str) -> String {
    normalize(raw).as_str().to_string()
}

#[test]
fn repairs_attribute_broken_by_misescaped_apostrophe() {
    assert_eq!(
        n(r#"<Node title="Opponent"s Deduced Range\" />"#),
        r#"<Node title="Opponent's Deduced Range" />"#
    );
}

#[test]
fn repair_reencodes_inner_double_quotes_as_entity() {
    assert_eq!(
        n(r#"<Node title="Player"s "Tight" Range\" />"#),
        r#"<Node title="Player's &quot;Tight&quot; Range" />"#
    );
}

#[test]
fn apostrophe_entity_in_single_quoted_literal_is_requoted() {
    assert_eq!(n("const s = 'Don&#39;t';"), r#"const s = "Don't";"#);
    assert_eq!(n("f('it&apos;s', 'x&#x27;y')"), r#"f("it's", "x'y")"#);
    assert_eq!(n("const s = 'Don&#039;t';"), r#"const s = "Don't";"#);
}

#[test]
fn literal_and_escaped_apostrophes_in_single_quoted_literal_are_requoted() {
    assert_eq!(n("const a = ['it's', 'b'];"), r#"const a = ["it's", 'b'];"#);
    assert_eq!(n(r"const s = 'Don\'t';"), r#"const s = "Don't";"#);
    assert_eq!(
        n(r#"const s = 'say "hi" it&#39;s';"#),
        r#"const s = "say \"hi\" it's";"#
    );
}

#[test]
fn single_quoted_literals_without_apostrophes_are_untouched() {
    let input = "const a = 'plain'; const b = x['key'];";
    assert_eq!(n(input), input);
}

#[test]
fn contractions_in_jsx_text_are_untouched() {
    let input = "<p>Don't do what's wrong, Bob's friend</p>";
    assert_eq!(n(input), input);
}

#[test]
fn attribute_values_decode_apostrophes_and_entity_encode_escaped_quotes() {
    assert_eq!(n(r#"<img alt="It&#39;s" />"#), r#"<img alt="It's" />"#);
    assert_eq!(
        n(r#"<img alt="He said \"hi\", it&#39;s" />"#),
        r#"<img alt="He said &quot;hi&quot;, it's" />"#
    );
}

#[test]
fn script_assignments_keep_their_escaped_quotes() {
    assert_eq!(
        n(r#"const a='it\'s "x"'; return a;"#),
        r#"const a="it's \"x\""; return a;"#
    );
    assert_eq!(
        n(r#"for (let i = 0; i<n; i++) s="it&#39;s \"ok\"";"#),
        r#"for (let i = 0; i<n; i++) s="it's \"ok\"";"#
    );
    assert_eq!(
        n(r#"<p title="It&#39;s">{t="it's \"x\""}</p>"#),
        r#"<p title="It's">{t="it's \"x\""}</p>"#
    );
}

#[test]
fn single_quoted_jsx_attribute_ends_up_double_quoted_and_valid() {
    assert_eq!(
        n(r#"<img title='say "hi" it&#39;s' />"#),
        r#"<img title="say &quot;hi&quot; it's" />"#
    );
}

#[test]
fn template_literals_decode_apostrophes() {
    assert_eq!(
        n("const s = `It&#39;s ${name}&apos;s turn`;"),
        "const s = `It's ${name}'s turn`;"
    );
}

#[test]
fn structural_entities_are_preserved_in_every_spelling() {
    let input = "<p>&lt;div&gt; &amp; &#60; &#x3E; &#0038; &quot;x&QUOT; &lt</p>";
    assert_eq!(n(input), input);
}

#[test]
fn non_structural_entities_decode_to_characters() {
    assert_eq!(
        n("<p>Caf&eacute; &mdash; 5&nbsp;m &#8364;</p>"),
        "<p>Café — 5\u{a0}m €</p>"
    );
}

#[test]
fn entity_behind_an_escaped_ampersand_stays_literal() {
    let input = "<p>&amp;eacute; is how you write é</p>";
    assert_eq!(n(input), input);
}

#[test]
fn normalizing_twice_is_a_no_op() {
    let input = concat!(
        "const t = 'It&#39;s';\n",
        r#"<div title="Opponent"s Deduced Range\" data-x="caf&eacute;">"#,
        "&lt;b&gt; &amp;&amp; &copy; &#34;</div>"
    );
    let once = n(input);
    assert_eq!(
        once,
        concat!(
            "const t = \"It's\";\n",
            r#"<div title="Opponent's Deduced Range" data-x="café">"#,
            "&lt;b&gt; &amp;&amp; © &#34;</div>"
        )
    );
    assert_eq!(n(&once), once);
}

#[test]
fn report_lists_the_stages_that_changed_text() {
    let (_, report) = normalize_with_report("f('it&#39;s') <b>&lt;&eacute;</b>");
    assert_eq!(
        report.changed,
        vec![
            Stage::StringLiterals,
            Stage::StructuralShield,
            Stage::EntityDecode
        ]
    );
    assert_eq!(report.structural_entities, 1);

    let (_, report) = normalize_with_report("return <div>ok</div>;");
    assert!(report.changed.is_empty());
}

#[test]
fn normalized_source_clones_share_storage() {
    let a = normalize("return 1;");
    let b = a.clone();
    assert!(a.ptr_eq(&b));
    assert!(!a.ptr_eq(&normalize("return 1;")));
}
