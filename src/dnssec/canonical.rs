use super::records::Rrsig;
use crate::dns::RRset;
use crate::error::ParseError;
use tracing::trace;

/// Build the byte stream an RRSIG signs over (RFC 4034 §3.1.8.1).
///
/// Returns the stream and whether the owner name was replaced by its
/// wildcard form because the signature covers fewer labels than the owner
/// carries (RFC 4035 §5.3.2). Record data is copied verbatim; only the
/// owner and signer names are lower-cased.
pub fn canonicalize(rrset: &RRset, rrsig: &Rrsig) -> Result<(Vec<u8>, bool), ParseError> {
    if rrsig.type_covered != rrset.rtype() {
        return Err(ParseError::TypeCoveredMismatch {
            covered: rrsig.type_covered.to_u16(),
            rrset: rrset.rtype().to_u16(),
        });
    }

    let owner = rrset.owner();
    let owner_labels = owner.label_count();
    let labels = rrsig.labels as usize;
    if labels > owner_labels {
        return Err(ParseError::LabelCountExceeded {
            labels: rrsig.labels,
            owner_labels: owner_labels.min(u8::MAX as usize) as u8,
        });
    }

    let is_wildcard = owner_labels > labels;
    if is_wildcard && rrset.rtype().forbids_wildcard() {
        return Err(ParseError::WildcardNotPermitted(rrset.rtype().to_u16()));
    }

    let owner_wire = if is_wildcard {
        owner.wildcard(labels).canonical_wire()
    } else {
        owner.canonical_wire()
    };
    trace!(
        owner = %owner,
        rtype = %rrset.rtype(),
        excess = owner_labels - labels,
        "canonicalizing rrset"
    );

    let header = rrsig.signed_header();
    let per_record = owner_wire.len() + 10;
    let total = header.len()
        + rrset
            .data()
            .iter()
            .map(|rdata| per_record + rdata.len())
            .sum::<usize>();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&header);

    let rtype = rrset.rtype().to_u16().to_be_bytes();
    let class = rrset.class().to_u16().to_be_bytes();
    let ttl = rrsig.original_ttl.to_be_bytes();
    for rdata in rrset.data() {
        let rdlen = u16::try_from(rdata.len()).map_err(|_| ParseError::RdataTooLong(rdata.len()))?;
        out.extend_from_slice(&owner_wire);
        out.extend_from_slice(&rtype);
        out.extend_from_slice(&class);
        out.extend_from_slice(&ttl);
        out.extend_from_slice(&rdlen.to_be_bytes());
        out.extend_from_slice(rdata);
    }

    Ok((out, is_wildcard))
}
